//! Family roles: an ordered, single-default set per family.
//!
//! Every operation reads the family's whole role set, computes the next set
//! with the [`engine`] functions and writes it back inside one
//! [`InMemoryEntityStore::write_scope`] span. One mutation publishes one
//! batch holding an event for every role that logically changed.

pub mod engine;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use famhub_fabric::{ChangeEvent, ListenerCenter, ListenerToken};
use famhub_store::InMemoryEntityStore;
use famhub_types::{Clock, CollectionDescriptor, FamilyRole, RoleTemplate, Scope};
use tracing::{debug, error, info};

use crate::error::{RepositoryError, Result};
use crate::traits::{EventHandler, FamilyRoleRepository};

/// [`FamilyRoleRepository`] over the shared entity store.
pub struct InMemoryFamilyRoleRepository {
    store: Arc<InMemoryEntityStore>,
    listeners: Arc<ListenerCenter>,
    clock: Arc<dyn Clock>,
    fallback_title: String,
}

impl InMemoryFamilyRoleRepository {
    pub fn new(
        store: Arc<InMemoryEntityStore>,
        listeners: Arc<ListenerCenter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            listeners,
            clock,
            fallback_title: engine::FALLBACK_TITLE.to_string(),
        }
    }

    /// Use `title` for the role synthesized when the last role is deleted.
    /// A blank title keeps the default.
    pub fn with_fallback_title(mut self, title: &str) -> Self {
        if !title.trim().is_empty() {
            self.fallback_title = title.trim().to_string();
        }
        self
    }

    /// Run one read-compute-write cycle on a family's roles.
    ///
    /// `op` receives the current roles in display order and returns the
    /// complete next set plus a value for the caller. The next set is
    /// checked against the invariants before anything is written.
    fn mutate<R>(
        &self,
        family_id: &str,
        op: impl FnOnce(Vec<FamilyRole>, DateTime<Utc>) -> Result<(Vec<FamilyRole>, R)>,
    ) -> Result<R> {
        let scope = Scope::family(family_id);
        let now = self.clock.now();
        self.store.write_scope::<FamilyRole, _, _>(&scope, |txn| {
            let mut before = txn.snapshot();
            before.sort_by(FamilyRole::order_cmp);

            let (after, output) = op(before.clone(), now)?;
            if let Err(violation) = engine::check_invariants(&after) {
                error!(family = family_id, %violation, "role mutation rejected");
                return Err(violation);
            }

            let events = engine::diff(&before, &after);
            debug!(family = family_id, events = events.len(), "role set committed");
            txn.replace_all(after);
            self.listeners
                .publish(&CollectionDescriptor::of::<FamilyRole>(scope.clone()), events);
            Ok(output)
        })
    }
}

fn find(roles: &[FamilyRole], role_id: &str) -> Result<FamilyRole> {
    roles
        .iter()
        .find(|r| r.id == role_id)
        .cloned()
        .ok_or_else(|| RepositoryError::not_found::<FamilyRole>(role_id))
}

impl FamilyRoleRepository for InMemoryFamilyRoleRepository {
    fn roles(&self, family_id: &str) -> Vec<FamilyRole> {
        let mut roles: Vec<FamilyRole> = self.store.list(&Scope::family(family_id));
        roles.sort_by(FamilyRole::order_cmp);
        roles
    }

    fn create(&self, role: FamilyRole) -> Result<FamilyRole> {
        let mut role = engine::normalize(role)?;
        let family_id = role.family_id.clone();
        self.mutate(&family_id, move |mut roles, now| {
            if roles.iter().any(|r| r.id == role.id) {
                return Err(RepositoryError::already_exists::<FamilyRole>(role.id.as_str()));
            }
            engine::ensure_unique_title(&role.title, None, &roles)?;
            if role.display_order < 0 {
                role.display_order = roles.iter().map(|r| r.display_order).max().map_or(0, |m| m + 1);
            }
            let id = role.id.clone();
            let forced = role.is_default.then(|| id.clone());
            roles.push(role);
            let roles = engine::persist(roles, forced.as_deref(), now);
            let created = find(&roles, &id)?;
            Ok((roles, created))
        })
    }

    fn update(&self, role: FamilyRole) -> Result<FamilyRole> {
        let mut role = engine::normalize(role)?;
        let family_id = role.family_id.clone();
        self.mutate(&family_id, move |mut roles, now| {
            let index = roles
                .iter()
                .position(|r| r.id == role.id)
                .ok_or_else(|| RepositoryError::not_found::<FamilyRole>(role.id.as_str()))?;
            engine::ensure_unique_title(&role.title, Some(role.id.as_str()), &roles)?;

            let previous = &roles[index];
            // The default can move to another role, never disappear.
            let keep_default = role.is_default || previous.is_default;
            if role.display_order < 0 {
                role.display_order = previous.display_order;
            }
            role.created_at = previous.created_at;
            role.updated_at = Some(now);

            let id = role.id.clone();
            roles[index] = role;
            let roles = engine::persist(roles, keep_default.then_some(id.as_str()), now);
            let updated = find(&roles, &id)?;
            Ok((roles, updated))
        })
    }

    fn delete(&self, role_id: &str, family_id: &str) -> Result<FamilyRole> {
        let fallback_title = self.fallback_title.clone();
        self.mutate(family_id, |mut roles, now| {
            let index = roles
                .iter()
                .position(|r| r.id == role_id)
                .ok_or_else(|| RepositoryError::not_found::<FamilyRole>(role_id))?;
            let removed = roles.remove(index);
            if roles.is_empty() {
                info!(family = family_id, title = %fallback_title, "last role removed, adding fallback role");
                roles.push(engine::fallback_role(family_id, &fallback_title, now));
            }
            let promoted = removed.is_default.then(|| roles[0].id.clone());
            Ok((engine::persist(roles, promoted.as_deref(), now), removed))
        })
    }

    fn reorder(&self, role_ids: &[String], family_id: &str) -> Result<Vec<FamilyRole>> {
        self.mutate(family_id, |roles, now| {
            let roles = engine::reorder(roles, role_ids, now)?;
            Ok((roles.clone(), roles))
        })
    }

    fn set_default(&self, role_id: &str, family_id: &str) -> Result<FamilyRole> {
        self.mutate(family_id, |roles, now| {
            find(&roles, role_id)?;
            let roles = engine::persist(roles, Some(role_id), now);
            let promoted = find(&roles, role_id)?;
            Ok((roles, promoted))
        })
    }

    fn move_role(&self, family_id: &str, from: usize, to: usize) -> Result<Vec<FamilyRole>> {
        self.mutate(family_id, |roles, now| {
            if from >= roles.len() || to >= roles.len() {
                return Err(RepositoryError::InvalidArgument(format!(
                    "cannot move role from {from} to {to} in a set of {}",
                    roles.len()
                )));
            }
            let mut ids: Vec<String> = roles.iter().map(|r| r.id.clone()).collect();
            let moved = ids.remove(from);
            ids.insert(to, moved);
            let roles = engine::reorder(roles, &ids, now)?;
            Ok((roles.clone(), roles))
        })
    }

    fn bootstrap_defaults(
        &self,
        family_id: &str,
        templates: &[RoleTemplate],
    ) -> Result<Vec<FamilyRole>> {
        self.mutate(family_id, |roles, now| {
            if !roles.is_empty() {
                return Ok((roles, Vec::new()));
            }
            let mut created: Vec<FamilyRole> = Vec::with_capacity(templates.len());
            for (index, template) in templates.iter().enumerate() {
                let role = engine::normalize(template.instantiate(family_id, index as i32, index == 0, now))?;
                engine::ensure_unique_title(&role.title, None, &created)?;
                created.push(role);
            }
            let created = engine::persist(created, None, now);
            if !created.is_empty() {
                info!(family = family_id, roles = created.len(), "default roles created");
            }
            Ok((created.clone(), created))
        })
    }

    fn observe(&self, family_id: &str, handler: EventHandler<FamilyRole>) -> ListenerToken {
        let scope = Scope::family(family_id);
        self.store.read_scope::<FamilyRole, _>(&scope, |view| {
            let mut current = view.to_vec();
            current.sort_by(FamilyRole::order_cmp);
            let initial = current
                .into_iter()
                .map(ChangeEvent::Added)
                .collect();
            self.listeners
                .listen_with_replay(CollectionDescriptor::of::<FamilyRole>(scope.clone()), initial, handler)
        })
    }
}

impl std::fmt::Debug for InMemoryFamilyRoleRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFamilyRoleRepository")
            .field("fallback_title", &self.fallback_title)
            .finish()
    }
}
