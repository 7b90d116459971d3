//! Error types for repository operations.

use famhub_fabric::ListenerError;
use famhub_types::{CollectionKind, Entity};
use thiserror::Error;

/// Errors returned synchronously by repository mutations and lookups.
///
/// Validation failures never travel through the change-event channel; only
/// [`RepositoryError::Listener`] wraps a failure that arrived from a
/// subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The referenced id does not exist in its scope.
    #[error("{collection} not found: {key}")]
    NotFound {
        collection: CollectionKind,
        key: String,
    },

    /// The id, or for roles the normalized title, is already taken.
    #[error("{collection} already exists: {key}")]
    AlreadyExists {
        collection: CollectionKind,
        key: String,
    },

    /// The caller passed something the operation cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A computed state broke an invariant. Indicates a bug, never bad input.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The password did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The operation requires a signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A subscription reported a failure.
    #[error("listener failure: {0}")]
    Listener(#[from] ListenerError),
}

impl RepositoryError {
    pub fn not_found<E: Entity>(key: impl Into<String>) -> Self {
        Self::NotFound {
            collection: E::COLLECTION,
            key: key.into(),
        }
    }

    pub fn already_exists<E: Entity>(key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            collection: E::COLLECTION,
            key: key.into(),
        }
    }

    /// Message suitable for showing to the person who triggered the error.
    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyExists {
                collection: CollectionKind::FamilyRoles,
                ..
            } => "A role with that title already exists.".into(),
            Self::NotFound {
                collection: CollectionKind::FamilyRoles,
                ..
            } => "The selected role could not be found.".into(),
            Self::AlreadyExists { .. } => "That item already exists.".into(),
            Self::NotFound { .. } => "The requested item could not be found.".into(),
            Self::InvalidArgument(message) => message.clone(),
            Self::InvalidCredentials => "The email or password is incorrect.".into(),
            Self::NotAuthenticated => "Please sign in to continue.".into(),
            Self::InvariantViolation(_) | Self::Listener(_) => {
                "Something went wrong. Please try again.".into()
            }
        }
    }
}

/// Convenience alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
