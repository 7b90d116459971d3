//! Foundation types for FamHub.
//!
//! This crate provides the entity models and the addressing primitives used
//! by every other FamHub crate. Entities are immutable value snapshots: a
//! mutation replaces the stored snapshot with a new one, it never aliases.
//!
//! # Key Types
//!
//! - [`Entity`]: a record with a stable id, one [`CollectionKind`] and one [`Scope`]
//! - [`CollectionDescriptor`]: `(collection, scope)` pair that names a change stream
//! - [`FamilyRole`]: the role model carrying ordering and default flags
//! - [`AppUser`], [`Family`], [`TaskItem`], [`ShoppingItem`], [`ActivityLog`]: the other models
//! - [`Clock`]: injectable time source for timestamps

pub mod activity;
pub mod clock;
pub mod collection;
pub mod error;
pub mod family;
pub mod role;
pub mod shopping;
pub mod task;
pub mod user;

pub use activity::{ActivityAction, ActivityLog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{CollectionDescriptor, CollectionKind, Entity, Scope};
pub use error::TypeError;
pub use family::{Family, FamilyMember};
pub use role::{
    default_templates, normalize_title_key, FamilyRole, Permission, RoleMetadata, RoleTemplate,
};
pub use shopping::{ShoppingItem, ShoppingStatus};
pub use task::{ChecklistItem, RepeatFrequency, RepeatRule, TaskItem, TaskPriority, TaskStatus};
pub use user::{AppUser, DeviceToken};
