#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Tool registry, XML tool-call extraction, and mode filtering.
//!
//! Both peers build the same registry at startup; the set of tool names is
//! closed and must agree across the channel.

mod entities;
pub mod extractor;
pub mod mode_filter;
pub mod registry;
pub mod validator;

pub use extractor::{ParsedToolCall, ToolCallExtractor, serialize_tool_call};
pub use mode_filter::{ModeFilter, ModeVerdict};
pub use registry::{ParamKind, ParamSpec, ToolDefinition, ToolRegistry};
pub use validator::{ValidationError, validate_parameters};
