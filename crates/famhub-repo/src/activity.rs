//! In-memory activity log.

use std::sync::Arc;

use famhub_fabric::{ListenerCenter, ListenerToken};
use famhub_store::InMemoryEntityStore;
use famhub_types::{ActivityLog, Scope};

use crate::entity::EntityRepository;
use crate::error::Result;
use crate::traits::{ActivityLogRepository, EventHandler};

/// Append-only view over [`ActivityLog`] entities.
#[derive(Debug, Clone)]
pub struct InMemoryActivityLogRepository {
    inner: EntityRepository<ActivityLog>,
}

impl InMemoryActivityLogRepository {
    pub fn new(store: Arc<InMemoryEntityStore>, listeners: Arc<ListenerCenter>) -> Self {
        Self {
            inner: EntityRepository::new(store, listeners),
        }
    }
}

impl ActivityLogRepository for InMemoryActivityLogRepository {
    fn append(&self, log: ActivityLog) -> Result<ActivityLog> {
        self.inner.create(log)
    }

    fn logs(&self, family_id: &str) -> Vec<ActivityLog> {
        let mut logs = self.inner.list(&Scope::family(family_id));
        logs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        logs
    }

    fn observe(&self, family_id: &str, handler: EventHandler<ActivityLog>) -> ListenerToken {
        self.inner.observe_sorted(
            &Scope::family(family_id),
            |logs| logs.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            handler,
        )
    }
}
