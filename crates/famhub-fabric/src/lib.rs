//! Change-notification fabric for FamHub.
//!
//! A [`ListenerCenter`] associates listeners with a
//! [`CollectionDescriptor`](famhub_types::CollectionDescriptor) and an entity
//! type, and delivers ordered batches of [`ChangeEvent`]s to every live
//! listener that matches.
//!
//! # Delivery Rules
//!
//! 1. Delivery never happens on the publisher's call stack: batches go
//!    through one FIFO delivery lane served by a dedicated thread.
//! 2. One publish is one batch; batches are never split or interleaved.
//! 3. A listener for `T` can only be reached by `publish::<T>`, so a handler
//!    never sees events of another type.
//! 4. Handler panics are isolated; the offending listener is dropped.
//! 5. Cancelling a [`ListenerToken`] suppresses every delivery that has not
//!    started yet, and is idempotent.

pub mod center;
pub mod config;
pub mod error;
pub mod event;
mod lane;
pub mod token;

pub use center::ListenerCenter;
pub use config::FabricConfig;
pub use error::{FabricError, ListenerError, Result};
pub use event::{ChangeEvent, ChangeKind, Delivery};
pub use token::ListenerToken;
