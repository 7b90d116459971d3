//! Repository facades for FamHub.
//!
//! Repositories are the only mutation surface for stored entities. Each one
//! turns a caller's request into one atomic span on the shared
//! [`InMemoryEntityStore`](famhub_store::InMemoryEntityStore) and publishes
//! the resulting change batch on the shared
//! [`ListenerCenter`](famhub_fabric::ListenerCenter) before the span ends.
//!
//! # Key Types
//!
//! - [`EntityRepository`]: generic create/update/delete/fetch/list/observe
//! - [`InMemoryFamilyRoleRepository`]: ordered, single-default role sets
//! - [`InMemoryAuthenticationRepository`]: accounts and the signed-in session
//! - [`RepositoryError`]: the error kinds every operation returns

pub mod activity;
pub mod auth;
pub mod entity;
pub mod error;
pub mod family;
pub mod roles;
pub mod shopping;
pub mod task;
pub mod traits;

pub use activity::InMemoryActivityLogRepository;
pub use auth::InMemoryAuthenticationRepository;
pub use entity::EntityRepository;
pub use error::{RepositoryError, Result};
pub use family::InMemoryFamilyRepository;
pub use roles::{engine, InMemoryFamilyRoleRepository};
pub use shopping::InMemoryShoppingRepository;
pub use task::InMemoryTaskRepository;
pub use traits::{
    ActivityLogRepository, AuthHandler, AuthenticationRepository, EventHandler, FamilyHandler,
    FamilyRepository, FamilyRoleRepository, ShoppingRepository, TaskRepository,
};
