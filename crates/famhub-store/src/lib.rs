//! Concurrent in-memory entity store for FamHub.
//!
//! The store maps `(entity type, scope, id)` to an immutable entity snapshot.
//! It is the only mutable shared state behind the repositories.
//!
//! # Design Rules
//!
//! 1. One `RwLock` per store instance, not per scope, so bulk operations that
//!    touch a whole scope are trivially atomic.
//! 2. Reads run concurrently with each other; no read observes a half-applied
//!    write.
//! 3. The store never interprets entities and never raises domain errors:
//!    absence is a `None`, uniqueness and invariants belong to repositories.
//! 4. [`InMemoryEntityStore::write_scope`] stages every change and applies
//!    it only when the closure returns `Ok`, so a read-validate-write span is
//!    all or nothing.
//! 5. No I/O and no subscriber code runs while the lock is held.

pub mod memory;
pub mod table;
pub mod txn;

pub use memory::InMemoryEntityStore;
pub use txn::{ScopeTxn, ScopeView};
