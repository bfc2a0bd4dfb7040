use thiserror::Error;

/// Unified error type for sync operations.
///
/// Collaborator traits (remote channel, key session, local store) speak this
/// type at their boundaries. Inside the coordinator most remote failures are
/// logged and degraded to "return the prior state" rather than propagated;
/// see [`SyncCoordinator`](crate::SyncCoordinator).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote channel is not reachable for this session.
    #[error("remote channel unavailable")]
    Unavailable,

    /// Encryption is enabled but no key is present in the session.
    #[error("encryption enabled but no key available")]
    EncryptionKeyMissing,

    /// The supplied password could not be turned into a key.
    #[error("encryption password rejected")]
    KeyRejected,

    /// Transport-level failure reported by the remote channel.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure in the local durable store.
    #[error("local store error: {0}")]
    Store(String),
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
