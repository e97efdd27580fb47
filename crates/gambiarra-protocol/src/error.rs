//! Protocol-level error types.

use thiserror::Error;

/// Errors that can occur on the framed channel.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame was not valid JSON.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] serde_json::Error),

    /// A frame was valid JSON but its `type` is not in the taxonomy.
    #[error("unrecognised frame type {frame_type:?}")]
    UnrecognizedFrame {
        /// The `type` value the peer sent, if any.
        frame_type: Option<String>,
    },

    /// A single frame exceeded the line-length cap.
    #[error("frame exceeds maximum length")]
    FrameTooLong,

    /// The peer closed the channel.
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
