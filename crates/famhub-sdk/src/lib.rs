//! High-level SDK for FamHub.
//!
//! [`FamilyHub`] is the main entry point for applications embedding FamHub:
//! it owns the entity store and the listener center and hands out every
//! repository wired to both.

pub mod config;
pub mod error;
pub mod hub;

pub use config::{HubConfig, RoleConfig};
pub use error::{HubError, HubResult};
pub use hub::FamilyHub;

// Re-export key types
pub use famhub_fabric::{ChangeEvent, ChangeKind, Delivery, ListenerToken};
pub use famhub_repo::{
    ActivityLogRepository, AuthenticationRepository, FamilyRepository, FamilyRoleRepository,
    RepositoryError, ShoppingRepository, TaskRepository,
};
pub use famhub_types::{
    ActivityLog, AppUser, Family, FamilyMember, FamilyRole, Permission, RoleMetadata, RoleTemplate,
    ShoppingItem, TaskItem,
};
