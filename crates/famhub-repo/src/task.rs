//! In-memory task repository.

use std::sync::Arc;

use famhub_fabric::{ListenerCenter, ListenerToken};
use famhub_store::InMemoryEntityStore;
use famhub_types::{Scope, TaskItem};

use crate::entity::EntityRepository;
use crate::error::Result;
use crate::traits::{EventHandler, TaskRepository};

#[derive(Debug, Clone)]
pub struct InMemoryTaskRepository {
    inner: EntityRepository<TaskItem>,
}

impl InMemoryTaskRepository {
    pub fn new(store: Arc<InMemoryEntityStore>, listeners: Arc<ListenerCenter>) -> Self {
        Self {
            inner: EntityRepository::new(store, listeners),
        }
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn create(&self, task: TaskItem) -> Result<TaskItem> {
        self.inner.create(task)
    }

    fn update(&self, task: TaskItem) -> Result<TaskItem> {
        self.inner.update(task)
    }

    fn delete(&self, task_id: &str, family_id: &str) -> Result<TaskItem> {
        self.inner.delete(&Scope::family(family_id), task_id)
    }

    fn fetch(&self, task_id: &str, family_id: &str) -> Result<TaskItem> {
        self.inner.fetch(&Scope::family(family_id), task_id)
    }

    /// Tasks ordered by due date (undated last), then creation time.
    fn tasks(&self, family_id: &str) -> Vec<TaskItem> {
        let mut tasks = self.inner.list(&Scope::family(family_id));
        tasks.sort_by(|a, b| {
            let due = match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            due.then(a.created_at.cmp(&b.created_at))
        });
        tasks
    }

    fn observe(&self, family_id: &str, handler: EventHandler<TaskItem>) -> ListenerToken {
        self.inner.observe(&Scope::family(family_id), handler)
    }
}
