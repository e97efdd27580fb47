#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Gambiarra Core - Foundation types shared by the orchestration server and
//! the workspace client.
//!
//! This crate provides:
//! - Correlation id newtypes (`SessionId`, `RequestId`, `ExecutionId`)
//! - Risk levels and operating modes
//! - The uniform `ToolResult` shape and the wire error taxonomy
//! - Per-session configuration

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use config::SessionConfig;
pub use error::ErrorCode;
pub use result::{ToolError, ToolResult, ToolStatus};
pub use types::{ExecutionId, OperatingMode, RequestId, RiskLevel, SessionId};
