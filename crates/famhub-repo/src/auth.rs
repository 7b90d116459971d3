//! In-memory accounts and the signed-in session.
//!
//! Passwords are never stored. Each account keeps a BLAKE3 digest of its
//! password, keyed by the user id, in a private [`Credential`] table of the
//! global scope. Session changes travel through the [`ListenerCenter`] as a
//! private entity type, so they share the delivery thread and ordering rules
//! of every other observer.

use std::sync::{Arc, Mutex, RwLock};

use famhub_fabric::{ChangeEvent, ListenerCenter, ListenerToken};
use famhub_store::InMemoryEntityStore;
use famhub_types::{AppUser, Clock, CollectionDescriptor, CollectionKind, Entity, Scope};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entity::EntityRepository;
use crate::error::{RepositoryError, Result};
use crate::traits::{AuthHandler, AuthenticationRepository};

/// Stored login material for one account.
#[derive(Clone, Debug)]
struct Credential {
    user_id: String,
    email_key: String,
    digest: blake3::Hash,
}

impl Credential {
    fn new(user_id: &str, email: &str, password: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email_key: email_key(email),
            digest: password_digest(user_id, password),
        }
    }

    fn verify(&self, password: &str) -> bool {
        // `blake3::Hash` equality is constant time.
        self.digest == password_digest(&self.user_id, password)
    }
}

impl Entity for Credential {
    const COLLECTION: CollectionKind = CollectionKind::Users;

    fn id(&self) -> &str {
        &self.user_id
    }

    fn scope(&self) -> Scope {
        Scope::Global
    }
}

/// The session as seen by auth observers.
#[derive(Clone, Debug)]
struct SessionState {
    user: Option<AppUser>,
}

impl Entity for SessionState {
    const COLLECTION: CollectionKind = CollectionKind::Users;

    fn id(&self) -> &str {
        "session"
    }

    fn scope(&self) -> Scope {
        Scope::Global
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

fn password_digest(user_id: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(user_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(password.as_bytes());
    hasher.finalize()
}

/// Accounts backed by the shared entity store.
///
/// Profiles are ordinary [`AppUser`] entities in the global scope, so
/// `sign_up` and `update_user` publish on `(users, global)` like any other
/// repository mutation. A credential and its profile are created and
/// re-keyed under `accounts`, so a sign-in never finds one without the
/// other.
pub struct InMemoryAuthenticationRepository {
    users: EntityRepository<AppUser>,
    clock: Arc<dyn Clock>,
    session: RwLock<Option<String>>,
    accounts: Mutex<()>,
}

impl InMemoryAuthenticationRepository {
    pub fn new(
        store: Arc<InMemoryEntityStore>,
        listeners: Arc<ListenerCenter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users: EntityRepository::new(store, listeners),
            clock,
            session: RwLock::new(None),
            accounts: Mutex::new(()),
        }
    }

    fn session_descriptor() -> CollectionDescriptor {
        CollectionDescriptor::of::<SessionState>(Scope::Global)
    }

    fn lookup(&self, user_id: &str) -> Option<AppUser> {
        self.users.store().get(&Scope::Global, user_id)
    }

    fn credential_for(&self, email: &str) -> Option<Credential> {
        let key = email_key(email);
        self.users
            .store()
            .read_scope::<Credential, _>(&Scope::Global, |view| {
                view.iter().find(|c| c.email_key == key).cloned()
            })
    }

    fn publish_session(&self, user: Option<AppUser>) {
        self.users.listeners().publish(
            &Self::session_descriptor(),
            vec![ChangeEvent::Modified(SessionState { user })],
        );
    }

    /// Point the session at `user` and notify observers while the session
    /// lock is held, so notifications follow session order.
    fn switch_session(&self, user: Option<AppUser>) {
        let mut session = self.session.write().expect("lock poisoned");
        *session = user.as_ref().map(|u| u.id.clone());
        debug!(user = ?session.as_deref(), "session changed");
        self.publish_session(user);
    }
}

impl AuthenticationRepository for InMemoryAuthenticationRepository {
    fn current_user(&self) -> Option<AppUser> {
        let session = self.session.read().expect("lock poisoned");
        session.as_deref().and_then(|id| self.lookup(id))
    }

    fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<AppUser> {
        let email = email.trim();
        if email.is_empty() {
            return Err(RepositoryError::InvalidArgument("Email cannot be empty.".into()));
        }
        let user_id = Uuid::now_v7().to_string();
        let credential = Credential::new(&user_id, email, password);

        let user = {
            let _accounts = self.accounts.lock().expect("lock poisoned");
            // Reserving the email and storing the digest is one atomic step.
            self.users
                .store()
                .write_scope::<Credential, _, _>(&Scope::Global, |txn| {
                    if txn.snapshot().iter().any(|c| c.email_key == credential.email_key) {
                        return Err(RepositoryError::already_exists::<AppUser>(email));
                    }
                    txn.put(credential.clone());
                    Ok(())
                })?;
            self.users
                .create(AppUser::new(user_id, email, display_name, self.clock.now()))?
        };
        info!(user = %user.id, "account created");
        self.switch_session(Some(user.clone()));
        Ok(user)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<AppUser> {
        let user = {
            let _accounts = self.accounts.lock().expect("lock poisoned");
            let credential = self
                .credential_for(email)
                .ok_or_else(|| RepositoryError::not_found::<AppUser>(email))?;
            if !credential.verify(password) {
                warn!(user = %credential.user_id, "sign-in rejected");
                return Err(RepositoryError::InvalidCredentials);
            }
            self.lookup(&credential.user_id)
                .ok_or_else(|| RepositoryError::not_found::<AppUser>(&credential.user_id))?
        };
        self.switch_session(Some(user.clone()));
        Ok(user)
    }

    fn sign_out(&self) -> Result<()> {
        let mut session = self.session.write().expect("lock poisoned");
        if session.take().is_none() {
            return Err(RepositoryError::NotAuthenticated);
        }
        debug!("session changed");
        self.publish_session(None);
        Ok(())
    }

    fn update_user(&self, user: AppUser) -> Result<AppUser> {
        let new_key = email_key(&user.email);
        if new_key.is_empty() {
            return Err(RepositoryError::InvalidArgument("Email cannot be empty.".into()));
        }

        let session = self.session.read().expect("lock poisoned");
        let _accounts = self.accounts.lock().expect("lock poisoned");
        self.users
            .store()
            .write_scope::<Credential, _, _>(&Scope::Global, |txn| {
                let mut credential = txn
                    .get(&user.id)
                    .cloned()
                    .ok_or_else(|| RepositoryError::not_found::<AppUser>(&user.id))?;
                if credential.email_key == new_key {
                    return Ok(());
                }
                let taken = txn
                    .snapshot()
                    .iter()
                    .any(|c| c.email_key == new_key && c.user_id != user.id);
                if taken {
                    return Err(RepositoryError::already_exists::<AppUser>(user.email.trim()));
                }
                credential.email_key = new_key.clone();
                txn.put(credential);
                Ok(())
            })?;
        let updated = self.users.update(user)?;

        if session.as_deref() == Some(updated.id.as_str()) {
            self.publish_session(Some(updated.clone()));
        }
        Ok(updated)
    }

    fn observe_auth_changes(&self, handler: AuthHandler) -> ListenerToken {
        let session = self.session.read().expect("lock poisoned");
        let current = session.as_deref().and_then(|id| self.lookup(id));
        self.users.listeners().listen_with_replay::<SessionState, _>(
            Self::session_descriptor(),
            vec![ChangeEvent::Added(SessionState { user: current })],
            move |delivery| match delivery {
                Ok(events) => {
                    if let Some(last) = events.into_iter().last() {
                        handler(last.into_entity().user);
                    }
                }
                Err(error) => warn!(%error, "auth observer received a failure"),
            },
        )
    }
}

impl std::fmt::Debug for InMemoryAuthenticationRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuthenticationRepository")
            .field("signed_in", &self.session.read().map(|s| s.is_some()).unwrap_or(false))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use famhub_fabric::FabricConfig;
    use famhub_types::ManualClock;

    fn repo() -> InMemoryAuthenticationRepository {
        let center = ListenerCenter::new(&FabricConfig::default()).unwrap();
        InMemoryAuthenticationRepository::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(center),
            Arc::new(ManualClock::at_unix(1_700_000_000)),
        )
    }

    #[test]
    fn sign_up_signs_in_and_stores_no_password() {
        let repo = repo();
        let user = repo.sign_up("ana@example.com", "hunter2", "Ana").unwrap();
        assert_eq!(repo.current_user(), Some(user.clone()));
        assert!(user.is_active);
        assert_eq!(user.created_at.timestamp(), 1_700_000_000);

        let credential = repo.credential_for("ana@example.com").unwrap();
        assert_ne!(credential.digest.to_hex().as_str(), "hunter2");
        assert!(credential.verify("hunter2"));
    }

    #[test]
    fn duplicate_email_is_rejected_ignoring_case() {
        let repo = repo();
        repo.sign_up("ana@example.com", "pw", "Ana").unwrap();
        let err = repo.sign_up(" ANA@example.com", "other", "Impostor").unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
        assert_eq!(repo.users.list_all().len(), 1);
    }

    #[test]
    fn sign_in_checks_email_then_password() {
        let repo = repo();
        let user = repo.sign_up("ana@example.com", "pw", "Ana").unwrap();
        repo.sign_out().unwrap();

        assert!(matches!(
            repo.sign_in("bob@example.com", "pw"),
            Err(RepositoryError::NotFound { .. })
        ));
        assert_eq!(
            repo.sign_in("ana@example.com", "wrong"),
            Err(RepositoryError::InvalidCredentials)
        );
        assert_eq!(repo.sign_in("Ana@Example.com", "pw").unwrap(), user);
    }

    #[test]
    fn sign_out_requires_a_session() {
        let repo = repo();
        assert_eq!(repo.sign_out(), Err(RepositoryError::NotAuthenticated));
        repo.sign_up("ana@example.com", "pw", "Ana").unwrap();
        repo.sign_out().unwrap();
        assert_eq!(repo.current_user(), None);
    }

    #[test]
    fn update_user_requires_existing_profile() {
        let repo = repo();
        let mut user = repo.sign_up("ana@example.com", "pw", "Ana").unwrap();
        user.display_name = "Ana Maria".into();
        repo.update_user(user.clone()).unwrap();
        assert_eq!(repo.current_user().unwrap().display_name, "Ana Maria");

        let stranger = AppUser::new("nobody", "x@example.com", "X", user.created_at);
        assert!(matches!(
            repo.update_user(stranger),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn email_change_moves_the_sign_in() {
        let repo = repo();
        let mut user = repo.sign_up("ana@example.com", "pw", "Ana").unwrap();
        user.email = "New@Example.com".into();
        repo.update_user(user.clone()).unwrap();
        repo.sign_out().unwrap();

        assert!(matches!(
            repo.sign_in("ana@example.com", "pw"),
            Err(RepositoryError::NotFound { .. })
        ));
        assert_eq!(repo.sign_in("new@example.com", "pw").unwrap(), user);
    }

    #[test]
    fn email_change_cannot_take_another_account_address() {
        let repo = repo();
        repo.sign_up("bob@example.com", "pw", "Bob").unwrap();
        let mut ana = repo.sign_up("ana@example.com", "pw", "Ana").unwrap();

        ana.email = " BOB@example.com".into();
        let err = repo.update_user(ana).unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
        assert_eq!(repo.current_user().unwrap().email, "ana@example.com");
        repo.sign_out().unwrap();
        assert_eq!(
            repo.sign_in("bob@example.com", "pw").unwrap().display_name,
            "Bob"
        );
    }

    #[test]
    fn concurrent_sign_outs_succeed_once() {
        let repo = Arc::new(repo());
        repo.sign_up("ana@example.com", "pw", "Ana").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || repo.sign_out().is_ok())
            })
            .collect();
        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(succeeded, 1);
    }

    #[test]
    fn sign_in_during_sign_up_never_sees_half_an_account() {
        let repo = Arc::new(repo());
        let signer = {
            let repo = Arc::clone(&repo);
            std::thread::spawn(move || repo.sign_up("ana@example.com", "pw", "Ana").unwrap())
        };

        let user = loop {
            match repo.sign_in("ana@example.com", "pw") {
                Ok(user) => break user,
                Err(RepositoryError::NotFound { key, .. }) => {
                    assert_eq!(key, "ana@example.com");
                    std::thread::yield_now();
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        };
        assert_eq!(user, signer.join().unwrap());
    }

    #[test]
    fn observers_see_current_user_then_changes() {
        let repo = repo();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = repo.observe_auth_changes(Box::new(move |user: Option<AppUser>| {
            sink.lock().unwrap().push(user.map(|u| u.display_name));
        }));

        repo.sign_up("ana@example.com", "pw", "Ana").unwrap();
        repo.sign_out().unwrap();
        repo.users.listeners().flush();
        token.cancel();
        repo.sign_in("ana@example.com", "pw").unwrap();
        repo.users.listeners().flush();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("Ana".to_string()), None]
        );
    }
}
