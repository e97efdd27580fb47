#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! LLM provider abstraction for the Gambiarra server.
//!
//! Providers stream plain text deltas; tool calls travel inside the text
//! as XML blocks and are extracted downstream, so the provider interface
//! stays a simple token stream.

pub mod error;
pub mod openai_compat;
pub mod provider;
pub mod scripted;
pub mod types;

pub use error::{LlmError, LlmResult};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{LlmProvider, StreamBox};
pub use scripted::ScriptedProvider;
pub use types::{ChatMessage, ChatRole};
