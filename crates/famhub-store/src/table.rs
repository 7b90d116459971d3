//! Type-indexed table storage backing [`crate::InMemoryEntityStore`].
//!
//! Each entity type gets its own table, looked up by `TypeId`. A table can
//! only ever be reached through its own type, so values never need a
//! runtime-checked cast that could fail for valid input.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use famhub_types::{Entity, Scope};

/// Entities of one scope keyed by id.
pub(crate) type Partition<E> = HashMap<String, E>;

/// All partitions of one entity type.
pub(crate) struct Table<E> {
    pub(crate) scopes: HashMap<Scope, Partition<E>>,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            scopes: HashMap::new(),
        }
    }
}

trait AnyTable: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn entity_count(&self) -> usize;
}

impl<E: Entity> AnyTable for Table<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn entity_count(&self) -> usize {
        self.scopes.values().map(HashMap::len).sum()
    }
}

#[derive(Default)]
pub(crate) struct Tables {
    by_type: HashMap<TypeId, Box<dyn AnyTable>>,
}

impl Tables {
    pub(crate) fn table<E: Entity>(&self) -> Option<&Table<E>> {
        self.by_type
            .get(&TypeId::of::<E>())
            .and_then(|table| table.as_any().downcast_ref::<Table<E>>())
    }

    pub(crate) fn table_mut<E: Entity>(&mut self) -> &mut Table<E> {
        self.by_type
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Table::<E>::default()))
            .as_any_mut()
            .downcast_mut::<Table<E>>()
            .expect("table is keyed by its own TypeId")
    }

    pub(crate) fn partition<E: Entity>(&self, scope: &Scope) -> Option<&Partition<E>> {
        self.table::<E>().and_then(|table| table.scopes.get(scope))
    }

    pub(crate) fn entity_count(&self) -> usize {
        self.by_type.values().map(|t| t.entity_count()).sum()
    }

    pub(crate) fn table_count(&self) -> usize {
        self.by_type.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_type.clear();
    }
}
