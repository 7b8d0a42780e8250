use std::time::Duration;

/// Errors that can occur in the chess service.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The peer closed the connection or the transport failed.
    #[error("connection closed")]
    ConnectionClosed,

    /// No frame arrived before the read deadline.
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// The waiting pool is at capacity; the player is refused.
    #[error("waiting pool full")]
    WaitingPoolFull,

    /// A configuration value is rejected.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
