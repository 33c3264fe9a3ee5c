//! Error types for the call session engine

use thiserror::Error;

/// Error type for call session operations
#[derive(Debug, Error)]
pub enum Error {
    /// Media acquisition refused by the user or device unavailable
    #[error("Media permission denied: {0}")]
    PermissionDenied(String),

    /// Peer-connection, description, or candidate operation failed
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// Signaling channel disconnected; new call attempts are rejected
    #[error("Signaling channel unavailable")]
    ChannelUnavailable,

    /// Operation not legal in the current call state
    #[error("Invalid call state: {0}")]
    InvalidState(String),

    /// Configuration validation failed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local track construction or attachment failed
    #[error("Media track error: {0}")]
    MediaTrack(String),

    /// Wire message encode/decode failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Send failure on the signaling channel
    #[error("Signaling error: {0}")]
    Signaling(String),
}

impl Error {
    /// Whether this error should tear down an established session.
    ///
    /// Description/candidate failures after setup are best-effort: the
    /// session is left as-is and the user can hang up manually.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, Error::PermissionDenied(_) | Error::InvalidConfig(_))
    }

    /// Whether a new call attempt may succeed on retry without user action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ChannelUnavailable | Error::Negotiation(_) | Error::Signaling(_)
        )
    }
}

/// Result type for call session operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
