#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Per-session state: conversation memory and the file-context tracker.
//!
//! Both peers use the same conversation-memory contract - the server as
//! the source of truth for model input, the client for display and
//! diagnostics.

pub mod memory;
pub mod tracker;

pub use memory::{ConversationMemory, ConversationMessage, ExportedMessage, MessageRole};
pub use tracker::{FileContextTracker, Freshness};
