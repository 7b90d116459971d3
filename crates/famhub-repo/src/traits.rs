//! Repository traits, one per entity kind.
//!
//! Every trait is object safe so the application can hold
//! `Arc<dyn TaskRepository>` and swap the in-memory implementation for a
//! hosted one. Mutations are synchronous and return either the stored
//! snapshot or a [`RepositoryError`](crate::RepositoryError); observers are
//! invoked later on the delivery thread.

use famhub_fabric::{Delivery, ListenerToken};
use famhub_types::{ActivityLog, AppUser, Family, FamilyRole, RoleTemplate, ShoppingItem, TaskItem};

use crate::error::Result;

/// Receives change batches (or a subscription failure) for one scope.
pub type EventHandler<T> = Box<dyn Fn(Delivery<T>) + Send + Sync + 'static>;

/// Receives the latest snapshot of one family, or why it is gone.
pub type FamilyHandler = Box<dyn Fn(Result<Family>) + Send + Sync + 'static>;

/// Receives the signed-in user after every session change.
pub type AuthHandler = Box<dyn Fn(Option<AppUser>) + Send + Sync + 'static>;

/// Account and session management.
pub trait AuthenticationRepository: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<AppUser>;

    /// Create an account and sign it in.
    ///
    /// Fails with `AlreadyExists` when the email is taken, ignoring case.
    fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<AppUser>;

    /// Fails with `NotFound` for an unknown email and `InvalidCredentials`
    /// for a wrong password.
    fn sign_in(&self, email: &str, password: &str) -> Result<AppUser>;

    /// Fails with `NotAuthenticated` when nobody is signed in.
    fn sign_out(&self) -> Result<()>;

    /// Replace a stored profile. Fails with `NotFound` if absent.
    fn update_user(&self, user: AppUser) -> Result<AppUser>;

    /// Report the current user, then every session change.
    fn observe_auth_changes(&self, handler: AuthHandler) -> ListenerToken;
}

pub trait FamilyRepository: Send + Sync {
    fn create(&self, family: Family) -> Result<Family>;
    fn update(&self, family: Family) -> Result<Family>;
    fn delete(&self, family_id: &str) -> Result<Family>;
    fn fetch(&self, family_id: &str) -> Result<Family>;

    /// Families whose member list contains `user_id`.
    fn families_for_user(&self, user_id: &str) -> Vec<Family>;

    /// Follow one family. Each batch is reduced to its last event; a removal
    /// is reported as `NotFound`.
    fn observe_family(&self, family_id: &str, handler: FamilyHandler) -> ListenerToken;
}

pub trait TaskRepository: Send + Sync {
    fn create(&self, task: TaskItem) -> Result<TaskItem>;
    fn update(&self, task: TaskItem) -> Result<TaskItem>;
    fn delete(&self, task_id: &str, family_id: &str) -> Result<TaskItem>;
    fn fetch(&self, task_id: &str, family_id: &str) -> Result<TaskItem>;
    fn tasks(&self, family_id: &str) -> Vec<TaskItem>;
    fn observe(&self, family_id: &str, handler: EventHandler<TaskItem>) -> ListenerToken;
}

pub trait ShoppingRepository: Send + Sync {
    fn create(&self, item: ShoppingItem) -> Result<ShoppingItem>;
    fn update(&self, item: ShoppingItem) -> Result<ShoppingItem>;
    fn delete(&self, item_id: &str, family_id: &str) -> Result<ShoppingItem>;
    fn fetch(&self, item_id: &str, family_id: &str) -> Result<ShoppingItem>;
    fn items(&self, family_id: &str) -> Vec<ShoppingItem>;
    fn observe(&self, family_id: &str, handler: EventHandler<ShoppingItem>) -> ListenerToken;
}

pub trait ActivityLogRepository: Send + Sync {
    fn append(&self, log: ActivityLog) -> Result<ActivityLog>;

    /// The family's log, oldest first.
    fn logs(&self, family_id: &str) -> Vec<ActivityLog>;

    fn observe(&self, family_id: &str, handler: EventHandler<ActivityLog>) -> ListenerToken;
}

/// Ordered, single-default role sets.
///
/// After every successful call the family's roles have display orders
/// exactly `0..n`, exactly one default, and case-insensitively unique
/// titles. A failed call changes nothing.
pub trait FamilyRoleRepository: Send + Sync {
    /// Roles sorted by display order.
    fn roles(&self, family_id: &str) -> Vec<FamilyRole>;

    /// Store a new role. A negative `display_order` appends it; requesting
    /// `is_default` demotes the previous default.
    fn create(&self, role: FamilyRole) -> Result<FamilyRole>;

    fn update(&self, role: FamilyRole) -> Result<FamilyRole>;

    /// Remove a role and return it. Removing the last role leaves a fallback
    /// role in its place; removing the default promotes the first remaining
    /// role.
    fn delete(&self, role_id: &str, family_id: &str) -> Result<FamilyRole>;

    /// Assign display orders by position in `role_ids`, which must be a
    /// permutation of the family's role ids. The default role is unchanged.
    fn reorder(&self, role_ids: &[String], family_id: &str) -> Result<Vec<FamilyRole>>;

    fn set_default(&self, role_id: &str, family_id: &str) -> Result<FamilyRole>;

    /// Move the role at position `from` to position `to`.
    fn move_role(&self, family_id: &str, from: usize, to: usize) -> Result<Vec<FamilyRole>>;

    /// Seed an empty family with one role per template. Returns the created
    /// roles, or nothing if the family already has roles.
    fn bootstrap_defaults(&self, family_id: &str, templates: &[RoleTemplate])
        -> Result<Vec<FamilyRole>>;

    fn observe(&self, family_id: &str, handler: EventHandler<FamilyRole>) -> ListenerToken;
}
