#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Gambiarra wire protocol.
//!
//! A single ordered duplex byte stream carries UTF-8 JSON objects, one per
//! line. The transport layer is request/response-free; correlation happens
//! through `request_id` / `execution_id` fields inside the frames.

pub mod error;
pub mod frames;
pub mod transport;
pub mod wrap;

pub use error::ProtocolError;
pub use frames::{
    ApprovalDecision, ClientInfo, ErrorPayload, Frame, ResponseChunk, ServerInfo, ToolInvocation,
    ToolSpec, UserTurn,
};
pub use transport::FrameTransport;
pub use wrap::{unwrap_parameters, wrap_parameters};
