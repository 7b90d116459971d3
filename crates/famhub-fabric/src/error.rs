use std::io;

/// Failure delivered to listeners in place of an event batch.
///
/// Cloned once per listener, so it carries only owned, cheap data.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    /// The publisher's internal state is no longer trustworthy.
    #[error("listener state corrupted: {0}")]
    Corrupted(String),

    /// The upstream change stream ended.
    #[error("change stream closed: {0}")]
    Closed(String),

    /// The backend reported a failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Errors produced while setting up the fabric itself.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// The delivery thread could not be started.
    #[error("failed to spawn delivery lane: {0}")]
    Spawn(#[from] io::Error),
}

/// Convenience alias used throughout the fabric crate.
pub type Result<T> = std::result::Result<T, FabricError>;
