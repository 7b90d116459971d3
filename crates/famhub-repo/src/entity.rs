//! Generic CRUD core shared by the per-kind repositories.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use famhub_fabric::{ChangeEvent, Delivery, ListenerCenter, ListenerToken};
use famhub_store::InMemoryEntityStore;
use famhub_types::{CollectionDescriptor, Entity, Scope};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::error::{RepositoryError, Result};

/// The mutation surface for one entity kind.
///
/// Each check-then-write runs inside one [`InMemoryEntityStore::write_scope`]
/// span, and the resulting event is handed to the [`ListenerCenter`] before
/// that span ends. Subscribers therefore see events in commit order, and one
/// successful mutation publishes exactly one single-event batch.
pub struct EntityRepository<E> {
    store: Arc<InMemoryEntityStore>,
    listeners: Arc<ListenerCenter>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityRepository<E> {
    pub fn new(store: Arc<InMemoryEntityStore>, listeners: Arc<ListenerCenter>) -> Self {
        Self {
            store,
            listeners,
            _entity: PhantomData,
        }
    }

    /// Store a new entity. Fails with `AlreadyExists` if its id is taken in
    /// its scope.
    pub fn create(&self, entity: E) -> Result<E> {
        let scope = entity.scope();
        self.store.write_scope::<E, _, _>(&scope, |txn| {
            if txn.contains(entity.id()) {
                return Err(RepositoryError::already_exists::<E>(entity.id()));
            }
            txn.put(entity.clone());
            self.emit(&scope, ChangeEvent::Added(entity.clone()));
            Ok(entity)
        })
    }

    /// Replace a stored entity. Fails with `NotFound` if absent.
    pub fn update(&self, entity: E) -> Result<E> {
        let scope = entity.scope();
        self.store.write_scope::<E, _, _>(&scope, |txn| {
            if !txn.contains(entity.id()) {
                return Err(RepositoryError::not_found::<E>(entity.id()));
            }
            txn.put(entity.clone());
            self.emit(&scope, ChangeEvent::Modified(entity.clone()));
            Ok(entity)
        })
    }

    /// Remove an entity and return the removed snapshot.
    pub fn delete(&self, scope: &Scope, id: &str) -> Result<E> {
        self.store.write_scope::<E, _, _>(scope, |txn| {
            let removed = txn
                .remove(id)
                .ok_or_else(|| RepositoryError::not_found::<E>(id))?;
            self.emit(scope, ChangeEvent::Removed(removed.clone()));
            Ok(removed)
        })
    }

    pub fn fetch(&self, scope: &Scope, id: &str) -> Result<E> {
        self.store
            .get(scope, id)
            .ok_or_else(|| RepositoryError::not_found::<E>(id))
    }

    /// Every entity in `scope`, in unspecified order.
    pub fn list(&self, scope: &Scope) -> Vec<E> {
        self.store.list(scope)
    }

    /// Every entity of this kind across all scopes.
    pub fn list_all(&self) -> Vec<E> {
        self.store.list_all()
    }

    /// Subscribe to `scope`. The handler first receives the current contents
    /// as one `Added` batch (skipped when the scope is empty), then every
    /// committed change, with no gap or overlap between the two.
    pub fn observe<F>(&self, scope: &Scope, handler: F) -> ListenerToken
    where
        F: Fn(Delivery<E>) + Send + Sync + 'static,
    {
        self.observe_sorted(scope, |_| {}, handler)
    }

    /// Like [`EntityRepository::observe`], with the replay batch arranged by
    /// `arrange` first.
    pub fn observe_sorted<F>(
        &self,
        scope: &Scope,
        arrange: impl FnOnce(&mut Vec<E>),
        handler: F,
    ) -> ListenerToken
    where
        F: Fn(Delivery<E>) + Send + Sync + 'static,
    {
        let descriptor = CollectionDescriptor::of::<E>(scope.clone());
        self.store.read_scope::<E, _>(scope, |view| {
            let mut current = view.to_vec();
            arrange(&mut current);
            let initial = current.into_iter().map(ChangeEvent::Added).collect();
            self.listeners.listen_with_replay(descriptor, initial, handler)
        })
    }

    /// Channel flavour of [`EntityRepository::observe`].
    pub fn observe_stream(&self, scope: &Scope) -> (ListenerToken, UnboundedReceiver<Delivery<E>>) {
        let descriptor = CollectionDescriptor::of::<E>(scope.clone());
        self.store.read_scope::<E, _>(scope, |view| {
            let initial = view.iter().cloned().map(ChangeEvent::Added).collect();
            self.listeners.stream_with_replay(descriptor, initial)
        })
    }

    pub fn store(&self) -> &Arc<InMemoryEntityStore> {
        &self.store
    }

    pub fn listeners(&self) -> &Arc<ListenerCenter> {
        &self.listeners
    }

    fn emit(&self, scope: &Scope, event: ChangeEvent<E>) {
        debug!(
            collection = %E::COLLECTION,
            scope = %scope,
            id = event.entity().id(),
            kind = %event.kind(),
            "mutation committed"
        );
        self.listeners
            .publish(&CollectionDescriptor::of::<E>(scope.clone()), vec![event]);
    }
}

impl<E> Clone for EntityRepository<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            listeners: Arc::clone(&self.listeners),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for EntityRepository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRepository")
            .field("collection", &E::COLLECTION)
            .finish()
    }
}
