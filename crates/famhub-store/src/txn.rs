//! Scoped read views and staged write transactions.

use std::collections::HashMap;

use famhub_types::Entity;

use crate::table::Partition;

/// Read-only view of one scope, valid while the store's shared lock is held.
pub struct ScopeView<'a, E> {
    partition: Option<&'a Partition<E>>,
}

impl<'a, E: Entity> ScopeView<'a, E> {
    pub(crate) fn new(partition: Option<&'a Partition<E>>) -> Self {
        Self { partition }
    }

    pub fn get(&self, id: &str) -> Option<&'a E> {
        self.partition.and_then(|p| p.get(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.partition.map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the scope's entities in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &'a E> + 'a {
        self.partition.into_iter().flat_map(|p| p.values())
    }

    /// Clone every entity of the scope, in unspecified order.
    pub fn to_vec(&self) -> Vec<E> {
        self.iter().cloned().collect()
    }
}

/// Staged mutation of one scope.
///
/// Reads see the committed state overlaid with everything staged so far.
/// Nothing reaches the store unless the enclosing
/// [`crate::InMemoryEntityStore::write_scope`] closure returns `Ok`.
pub struct ScopeTxn<'a, E> {
    base: Option<&'a Partition<E>>,
    cleared: bool,
    staged: HashMap<String, Option<E>>,
}

impl<'a, E: Entity> ScopeTxn<'a, E> {
    pub(crate) fn new(base: Option<&'a Partition<E>>) -> Self {
        Self {
            base,
            cleared: false,
            staged: HashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        match self.staged.get(id) {
            Some(staged) => staged.as_ref(),
            None if self.cleared => None,
            None => self.base.and_then(|p| p.get(id)),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Clone the scope's entities as they would be after commit, in
    /// unspecified order.
    pub fn snapshot(&self) -> Vec<E> {
        let staged = self.staged.values().flatten();
        if self.cleared {
            return staged.cloned().collect();
        }
        let untouched = self
            .base
            .into_iter()
            .flat_map(|p| p.values())
            .filter(|e| !self.staged.contains_key(e.id()));
        untouched.chain(staged).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stage an upsert keyed by the entity's id.
    pub fn put(&mut self, entity: E) {
        self.staged.insert(entity.id().to_string(), Some(entity));
    }

    /// Stage a removal, returning the value it hides.
    pub fn remove(&mut self, id: &str) -> Option<E> {
        let prior = self.get(id).cloned();
        if prior.is_some() {
            self.staged.insert(id.to_string(), None);
        }
        prior
    }

    /// Stage a replacement of the whole scope.
    pub fn replace_all(&mut self, entities: impl IntoIterator<Item = E>) {
        self.cleared = true;
        self.staged = entities
            .into_iter()
            .map(|e| (e.id().to_string(), Some(e)))
            .collect();
    }

    pub(crate) fn into_staged(self) -> (bool, HashMap<String, Option<E>>) {
        (self.cleared, self.staged)
    }

    fn snapshot_len(&self) -> usize {
        let live_staged = self.staged.values().filter(|v| v.is_some()).count();
        if self.cleared {
            return live_staged;
        }
        let untouched = self
            .base
            .map_or(0, |p| p.keys().filter(|k| !self.staged.contains_key(*k)).count());
        untouched + live_staged
    }
}
