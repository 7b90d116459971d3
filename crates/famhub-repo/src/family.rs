//! In-memory family repository.
//!
//! Each family is its own scope, so a family's change stream is addressed as
//! `families/<family id>`.

use std::sync::Arc;

use famhub_fabric::{ChangeEvent, ListenerCenter, ListenerToken};
use famhub_store::InMemoryEntityStore;
use famhub_types::{Family, Scope};
use tracing::warn;

use crate::entity::EntityRepository;
use crate::error::{RepositoryError, Result};
use crate::traits::{FamilyHandler, FamilyRepository};

#[derive(Debug, Clone)]
pub struct InMemoryFamilyRepository {
    inner: EntityRepository<Family>,
}

impl InMemoryFamilyRepository {
    pub fn new(store: Arc<InMemoryEntityStore>, listeners: Arc<ListenerCenter>) -> Self {
        Self {
            inner: EntityRepository::new(store, listeners),
        }
    }
}

impl FamilyRepository for InMemoryFamilyRepository {
    fn create(&self, family: Family) -> Result<Family> {
        self.inner.create(family)
    }

    fn update(&self, family: Family) -> Result<Family> {
        self.inner.update(family)
    }

    fn delete(&self, family_id: &str) -> Result<Family> {
        self.inner.delete(&Scope::family(family_id), family_id)
    }

    fn fetch(&self, family_id: &str) -> Result<Family> {
        self.inner.fetch(&Scope::family(family_id), family_id)
    }

    fn families_for_user(&self, user_id: &str) -> Vec<Family> {
        let mut families: Vec<Family> = self
            .inner
            .list_all()
            .into_iter()
            .filter(|f| f.has_member(user_id))
            .collect();
        families.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        families
    }

    fn observe_family(&self, family_id: &str, handler: FamilyHandler) -> ListenerToken {
        let id = family_id.to_string();
        self.inner
            .observe(&Scope::family(family_id), move |delivery| match delivery {
                Ok(events) => {
                    let Some(last) = events.into_iter().last() else {
                        return;
                    };
                    match last {
                        ChangeEvent::Removed(_) => {
                            handler(Err(RepositoryError::not_found::<Family>(id.as_str())))
                        }
                        event => handler(Ok(event.into_entity())),
                    }
                }
                Err(error) => {
                    warn!(family = %id, %error, "family observer received a failure");
                    handler(Err(error.into()));
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};
    use famhub_fabric::FabricConfig;
    use famhub_types::FamilyMember;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    fn family(id: &str, created: i64, members: &[&str]) -> Family {
        Family {
            id: id.into(),
            name: format!("The {id}s"),
            owner_id: members.first().map(|m| m.to_string()).unwrap_or_default(),
            members: members
                .iter()
                .map(|m| FamilyMember {
                    user_id: m.to_string(),
                    role_ids: Vec::new(),
                    joined_at: at(created),
                    invited_by: None,
                })
                .collect(),
            photo_url: None,
            created_at: at(created),
            updated_at: None,
        }
    }

    fn repo() -> InMemoryFamilyRepository {
        let center = ListenerCenter::new(&FabricConfig::default()).unwrap();
        InMemoryFamilyRepository::new(Arc::new(InMemoryEntityStore::new()), Arc::new(center))
    }

    #[test]
    fn families_for_user_filters_by_membership() {
        let repo = repo();
        repo.create(family("lee", 200, &["ana", "bo"])).unwrap();
        repo.create(family("kim", 100, &["ana"])).unwrap();
        repo.create(family("park", 300, &["cy"])).unwrap();

        let ids: Vec<String> = repo
            .families_for_user("ana")
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, ["kim", "lee"]);
        assert!(repo.families_for_user("nobody").is_empty());
    }

    #[test]
    fn fetch_and_update_by_id() {
        let repo = repo();
        assert!(matches!(repo.fetch("lee"), Err(RepositoryError::NotFound { .. })));
        let mut lee = repo.create(family("lee", 100, &["ana"])).unwrap();
        lee.name = "Lee household".into();
        repo.update(lee.clone()).unwrap();
        assert_eq!(repo.fetch("lee").unwrap(), lee);
    }

    #[test]
    fn observe_family_reports_last_state_and_removal() {
        let repo = repo();
        repo.create(family("lee", 100, &["ana"])).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _token = repo.observe_family(
            "lee",
            Box::new(move |result: Result<Family>| {
                sink.lock().unwrap().push(result.map(|f| f.name));
            }),
        );

        let mut renamed = family("lee", 100, &["ana"]);
        renamed.name = "Lee household".into();
        repo.update(renamed).unwrap();
        repo.delete("lee").unwrap();
        repo.inner.listeners().flush();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], Ok("The lees".to_string()));
        assert_eq!(seen[1], Ok("Lee household".to_string()));
        assert!(matches!(seen[2], Err(RepositoryError::NotFound { .. })));
        assert_eq!(seen.len(), 3);
    }
}
