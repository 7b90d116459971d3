use std::sync::RwLock;

use famhub_types::{Entity, Scope};
use tracing::trace;

use crate::table::Tables;
use crate::txn::{ScopeTxn, ScopeView};

/// In-memory, scope-partitioned entity store.
///
/// All tables live behind a single `RwLock`. Entities are cloned on read and
/// write, so callers only ever hold snapshots. Share one instance between
/// repositories with an `Arc`.
pub struct InMemoryEntityStore {
    tables: RwLock<Tables>,
}

impl InMemoryEntityStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Upsert an entity into `scope`, replacing any entity with the same id.
    pub fn put<E: Entity>(&self, scope: &Scope, entity: E) {
        let mut tables = self.tables.write().expect("lock poisoned");
        tables
            .table_mut::<E>()
            .scopes
            .entry(scope.clone())
            .or_default()
            .insert(entity.id().to_string(), entity);
    }

    /// Snapshot read of one entity.
    pub fn get<E: Entity>(&self, scope: &Scope, id: &str) -> Option<E> {
        let tables = self.tables.read().expect("lock poisoned");
        tables.partition::<E>(scope).and_then(|p| p.get(id)).cloned()
    }

    /// Remove an entity, returning the prior value if there was one.
    pub fn remove<E: Entity>(&self, scope: &Scope, id: &str) -> Option<E> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let table = tables.table_mut::<E>();
        let partition = table.scopes.get_mut(scope)?;
        let removed = partition.remove(id);
        if partition.is_empty() {
            table.scopes.remove(scope);
        }
        removed
    }

    /// Snapshot of every entity in `scope`, in unspecified order.
    pub fn list<E: Entity>(&self, scope: &Scope) -> Vec<E> {
        let tables = self.tables.read().expect("lock poisoned");
        ScopeView::new(tables.partition::<E>(scope)).to_vec()
    }

    /// Snapshot of every entity of type `E` across all scopes.
    pub fn list_all<E: Entity>(&self) -> Vec<E> {
        let tables = self.tables.read().expect("lock poisoned");
        tables
            .table::<E>()
            .map(|t| t.scopes.values().flat_map(|p| p.values()).cloned().collect())
            .unwrap_or_default()
    }

    /// Replace the whole content of `scope` in one step.
    pub fn replace_scope<E: Entity>(&self, scope: &Scope, entities: Vec<E>) {
        let mut tables = self.tables.write().expect("lock poisoned");
        let table = tables.table_mut::<E>();
        if entities.is_empty() {
            table.scopes.remove(scope);
            return;
        }
        let partition = entities
            .into_iter()
            .map(|e| (e.id().to_string(), e))
            .collect();
        table.scopes.insert(scope.clone(), partition);
    }

    /// Number of entities of type `E` in `scope`.
    pub fn scope_len<E: Entity>(&self, scope: &Scope) -> usize {
        let tables = self.tables.read().expect("lock poisoned");
        ScopeView::new(tables.partition::<E>(scope)).len()
    }

    /// Run `f` against a consistent view of `scope` under the shared lock.
    ///
    /// Writers are excluded until `f` returns. Keep `f` short: it must not
    /// call back into the store.
    pub fn read_scope<E, R>(&self, scope: &Scope, f: impl FnOnce(ScopeView<'_, E>) -> R) -> R
    where
        E: Entity,
    {
        let tables = self.tables.read().expect("lock poisoned");
        f(ScopeView::new(tables.partition::<E>(scope)))
    }

    /// Run a read-validate-write span on `scope` under the exclusive lock.
    ///
    /// Changes staged on the [`ScopeTxn`] are applied only when `f` returns
    /// `Ok`; an `Err` leaves the store untouched. `f` must not call back into
    /// the store.
    pub fn write_scope<E, R, X>(
        &self,
        scope: &Scope,
        f: impl FnOnce(&mut ScopeTxn<'_, E>) -> Result<R, X>,
    ) -> Result<R, X>
    where
        E: Entity,
    {
        let mut tables = self.tables.write().expect("lock poisoned");
        let table = tables.table_mut::<E>();

        let mut txn = ScopeTxn::new(table.scopes.get(scope));
        let result = f(&mut txn)?;
        let (cleared, staged) = txn.into_staged();

        let staged_count = staged.len();
        let partition = table.scopes.entry(scope.clone()).or_default();
        if cleared {
            partition.clear();
        }
        for (id, value) in staged {
            match value {
                Some(entity) => {
                    partition.insert(id, entity);
                }
                None => {
                    partition.remove(&id);
                }
            }
        }
        if partition.is_empty() {
            table.scopes.remove(scope);
        }

        trace!(
            collection = %E::COLLECTION,
            scope = %scope,
            staged = staged_count,
            cleared,
            "scope committed"
        );
        Ok(result)
    }

    /// Total number of entities across all types and scopes.
    pub fn len(&self) -> usize {
        self.tables.read().expect("lock poisoned").entity_count()
    }

    /// Returns `true` if the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entity of every type.
    pub fn clear(&self) {
        self.tables.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read().expect("lock poisoned");
        f.debug_struct("InMemoryEntityStore")
            .field("table_count", &tables.table_count())
            .field("entity_count", &tables.entity_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use famhub_types::CollectionKind;
    use std::sync::Arc;
    use std::thread;

    #[derive(Clone, Debug, PartialEq)]
    struct Note {
        id: String,
        family: String,
        body: String,
    }

    impl Entity for Note {
        const COLLECTION: CollectionKind = CollectionKind::Tasks;

        fn id(&self) -> &str {
            &self.id
        }

        fn scope(&self) -> Scope {
            Scope::family(self.family.clone())
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Tag {
        id: String,
    }

    impl Entity for Tag {
        const COLLECTION: CollectionKind = CollectionKind::Users;

        fn id(&self) -> &str {
            &self.id
        }

        fn scope(&self) -> Scope {
            Scope::Global
        }
    }

    fn note(id: &str, family: &str, body: &str) -> Note {
        Note {
            id: id.into(),
            family: family.into(),
            body: body.into(),
        }
    }

    fn fam(id: &str) -> Scope {
        Scope::family(id)
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("n1", "f1", "hello"));

        let read = store.get::<Note>(&fam("f1"), "n1").expect("should exist");
        assert_eq!(read.body, "hello");
    }

    #[test]
    fn put_overwrites_same_id() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("n1", "f1", "first"));
        store.put(&fam("f1"), note("n1", "f1", "second"));

        assert_eq!(store.scope_len::<Note>(&fam("f1")), 1);
        assert_eq!(store.get::<Note>(&fam("f1"), "n1").unwrap().body, "second");
    }

    #[test]
    fn get_missing_returns_none() {
        let store = InMemoryEntityStore::new();
        assert!(store.get::<Note>(&fam("f1"), "missing").is_none());
    }

    #[test]
    fn remove_returns_prior_value() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("n1", "f1", "bye"));

        let removed = store.remove::<Note>(&fam("f1"), "n1");
        assert_eq!(removed.map(|n| n.body), Some("bye".to_string()));
        assert!(store.remove::<Note>(&fam("f1"), "n1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn scopes_are_isolated() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("n1", "f1", "a"));
        store.put(&fam("f2"), note("n1", "f2", "b"));

        assert_eq!(store.get::<Note>(&fam("f1"), "n1").unwrap().body, "a");
        assert_eq!(store.get::<Note>(&fam("f2"), "n1").unwrap().body, "b");
        assert_eq!(store.list::<Note>(&fam("f1")).len(), 1);
        assert_eq!(store.list_all::<Note>().len(), 2);
    }

    #[test]
    fn types_are_isolated() {
        let store = InMemoryEntityStore::new();
        store.put(&Scope::Global, Tag { id: "x".into() });
        store.put(&Scope::Global, note("x", "global", "n"));

        assert_eq!(store.list::<Tag>(&Scope::Global).len(), 1);
        assert_eq!(store.list::<Note>(&Scope::Global).len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn replace_scope_swaps_contents() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("old", "f1", "x"));
        store.replace_scope(&fam("f1"), vec![note("a", "f1", "1"), note("b", "f1", "2")]);

        let mut ids: Vec<String> = store.list::<Note>(&fam("f1")).into_iter().map(|n| n.id).collect();
        ids.sort();
        assert_eq!(ids, ["a", "b"]);

        store.replace_scope::<Note>(&fam("f1"), Vec::new());
        assert!(store.list::<Note>(&fam("f1")).is_empty());
    }

    // -----------------------------------------------------------------------
    // Scoped spans
    // -----------------------------------------------------------------------

    #[test]
    fn read_scope_sees_consistent_view() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("a", "f1", "1"));
        store.put(&fam("f1"), note("b", "f1", "2"));

        let (len, has_a) = store.read_scope::<Note, _>(&fam("f1"), |view| (view.len(), view.contains("a")));
        assert_eq!(len, 2);
        assert!(has_a);

        let empty = store.read_scope::<Note, _>(&fam("nobody"), |view| view.is_empty());
        assert!(empty);
    }

    #[test]
    fn write_scope_commits_on_ok() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("a", "f1", "1"));

        let result: Result<usize, ()> = store.write_scope::<Note, _, _>(&fam("f1"), |txn| {
            txn.put(note("b", "f1", "2"));
            let removed = txn.remove("a");
            assert!(removed.is_some());
            assert!(!txn.contains("a"));
            assert!(txn.contains("b"));
            Ok(txn.len())
        });

        assert_eq!(result, Ok(1));
        assert!(store.get::<Note>(&fam("f1"), "a").is_none());
        assert!(store.get::<Note>(&fam("f1"), "b").is_some());
    }

    #[test]
    fn write_scope_discards_on_err() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("a", "f1", "1"));

        let result: Result<(), &str> = store.write_scope::<Note, _, _>(&fam("f1"), |txn| {
            txn.put(note("b", "f1", "2"));
            txn.remove("a");
            Err("validation failed")
        });

        assert_eq!(result, Err("validation failed"));
        assert!(store.get::<Note>(&fam("f1"), "a").is_some());
        assert!(store.get::<Note>(&fam("f1"), "b").is_none());
    }

    #[test]
    fn write_scope_replace_all() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("a", "f1", "1"));

        let result: Result<Vec<Note>, ()> = store.write_scope::<Note, _, _>(&fam("f1"), |txn| {
            txn.replace_all(vec![note("c", "f1", "3")]);
            assert!(!txn.contains("a"));
            Ok(txn.snapshot())
        });

        assert_eq!(result.unwrap().len(), 1);
        let all = store.list::<Note>(&fam("f1"));
        assert_eq!(all, vec![note("c", "f1", "3")]);
    }

    #[test]
    fn snapshot_overlays_staged_changes() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("a", "f1", "old"));
        store.put(&fam("f1"), note("b", "f1", "keep"));

        let _: Result<(), ()> = store.write_scope::<Note, _, _>(&fam("f1"), |txn| {
            txn.put(note("a", "f1", "new"));
            let mut snap = txn.snapshot();
            snap.sort_by(|l, r| l.id.cmp(&r.id));
            assert_eq!(snap, vec![note("a", "f1", "new"), note("b", "f1", "keep")]);
            Ok(())
        });
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writes_are_all_applied() {
        let store = Arc::new(InMemoryEntityStore::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..25 {
                        let id = format!("w{worker}-{i}");
                        store.put(&fam("shared"), note(&id, "shared", "x"));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.scope_len::<Note>(&fam("shared")), 200);
    }

    #[test]
    fn concurrent_read_modify_write_spans_do_not_lose_updates() {
        let store = Arc::new(InMemoryEntityStore::new());
        store.put(&fam("f"), note("counter", "f", "0"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _: Result<(), ()> = store.write_scope::<Note, _, _>(&fam("f"), |txn| {
                            let current: u32 = txn.get("counter").unwrap().body.parse().unwrap();
                            txn.put(note("counter", "f", &(current + 1).to_string()));
                            Ok(())
                        });
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
        let counter = store.get::<Note>(&fam("f"), "counter").unwrap();
        assert_eq!(counter.body, "400");
    }

    // -----------------------------------------------------------------------
    // Misc
    // -----------------------------------------------------------------------

    #[test]
    fn clear_removes_all() {
        let store = InMemoryEntityStore::default();
        store.put(&fam("f1"), note("a", "f1", "1"));
        store.put(&Scope::Global, Tag { id: "t".into() });
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryEntityStore::new();
        store.put(&fam("f1"), note("a", "f1", "1"));
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryEntityStore"));
        assert!(debug.contains("entity_count: 1"));
    }
}
