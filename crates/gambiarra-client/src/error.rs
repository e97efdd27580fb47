//! Client-side error types.

use thiserror::Error;

/// Errors raised by the workspace client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Channel-level failure.
    #[error(transparent)]
    Protocol(#[from] gambiarra_protocol::ProtocolError),

    /// The handshake did not complete.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// A session-scoped frame arrived before `session_created`.
    #[error("no active session")]
    NoActiveSession,

    /// The server closed the channel.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Workspace initialisation failure (bad root, unreadable ignore file).
    #[error("workspace error: {0}")]
    Workspace(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
