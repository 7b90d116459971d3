use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::center::Registry;

/// Identifier of one registration within a [`crate::ListenerCenter`].
pub(crate) type ListenerId = u64;

/// Handle for a live registration.
///
/// Cancelling stops every delivery to the listener that has not started yet.
/// Cancel is idempotent and safe after the center itself has been dropped:
/// the token only holds a weak back-reference. Dropping a token does not
/// cancel it.
#[derive(Clone)]
pub struct ListenerToken {
    id: ListenerId,
    type_id: TypeId,
    active: Arc<AtomicBool>,
    registry: Weak<Registry>,
}

impl ListenerToken {
    pub(crate) fn new(
        id: ListenerId,
        type_id: TypeId,
        active: Arc<AtomicBool>,
        registry: Weak<Registry>,
    ) -> Self {
        Self {
            id,
            type_id,
            active,
            registry,
        }
    }

    /// Deregister the listener.
    pub fn cancel(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.type_id, self.id);
        }
    }

    /// `false` once cancelled, or once the listener was dropped after a
    /// panicking handler.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl PartialEq for ListenerToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.registry, &other.registry)
    }
}

impl Eq for ListenerToken {}

impl fmt::Debug for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerToken")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
