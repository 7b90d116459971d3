//! In-memory shopping-list repository.

use std::sync::Arc;

use famhub_fabric::{ListenerCenter, ListenerToken};
use famhub_store::InMemoryEntityStore;
use famhub_types::{Scope, ShoppingItem};

use crate::entity::EntityRepository;
use crate::error::Result;
use crate::traits::{EventHandler, ShoppingRepository};

#[derive(Debug, Clone)]
pub struct InMemoryShoppingRepository {
    inner: EntityRepository<ShoppingItem>,
}

impl InMemoryShoppingRepository {
    pub fn new(store: Arc<InMemoryEntityStore>, listeners: Arc<ListenerCenter>) -> Self {
        Self {
            inner: EntityRepository::new(store, listeners),
        }
    }
}

impl ShoppingRepository for InMemoryShoppingRepository {
    fn create(&self, item: ShoppingItem) -> Result<ShoppingItem> {
        self.inner.create(item)
    }

    fn update(&self, item: ShoppingItem) -> Result<ShoppingItem> {
        self.inner.update(item)
    }

    fn delete(&self, item_id: &str, family_id: &str) -> Result<ShoppingItem> {
        self.inner.delete(&Scope::family(family_id), item_id)
    }

    fn fetch(&self, item_id: &str, family_id: &str) -> Result<ShoppingItem> {
        self.inner.fetch(&Scope::family(family_id), item_id)
    }

    /// Items in creation order.
    fn items(&self, family_id: &str) -> Vec<ShoppingItem> {
        let mut items = self.inner.list(&Scope::family(family_id));
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    fn observe(&self, family_id: &str, handler: EventHandler<ShoppingItem>) -> ListenerToken {
        self.inner.observe(&Scope::family(family_id), handler)
    }
}
