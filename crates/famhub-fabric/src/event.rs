use std::fmt;

use crate::error::ListenerError;

/// What a mutation did to one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => f.write_str("added"),
            ChangeKind::Modified => f.write_str("modified"),
            ChangeKind::Removed => f.write_str("removed"),
        }
    }
}

/// A change-tagged entity snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent<T> {
    Added(T),
    Modified(T),
    Removed(T),
}

impl<T> ChangeEvent<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Added(_) => ChangeKind::Added,
            ChangeEvent::Modified(_) => ChangeKind::Modified,
            ChangeEvent::Removed(_) => ChangeKind::Removed,
        }
    }

    pub fn entity(&self) -> &T {
        match self {
            ChangeEvent::Added(e) | ChangeEvent::Modified(e) | ChangeEvent::Removed(e) => e,
        }
    }

    pub fn into_entity(self) -> T {
        match self {
            ChangeEvent::Added(e) | ChangeEvent::Modified(e) | ChangeEvent::Removed(e) => e,
        }
    }
}

/// What a listener receives: a batch from one mutation, or a failure.
pub type Delivery<T> = std::result::Result<Vec<ChangeEvent<T>>, ListenerError>;
