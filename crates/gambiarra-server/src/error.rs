//! Server-side error types.

use thiserror::Error;

/// Errors raised by the orchestration server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Channel-level failure.
    #[error(transparent)]
    Protocol(#[from] gambiarra_protocol::ProtocolError),

    /// The client closed the channel; the session is torn down.
    #[error("connection closed by client")]
    ConnectionClosed,

    /// The configured session cap was reached.
    #[error("session limit reached ({0} active)")]
    SessionLimitReached(usize),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
