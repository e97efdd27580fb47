#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Gambiarra orchestration server.
//!
//! The server talks to the LLM and drives the tool-call conversation. It
//! never touches the workspace: every tool executes on the client after
//! client-side approval, and only the result comes back.

pub mod config;
pub mod connection;
pub mod error;
pub mod prompt;
pub mod server;
pub mod session;
pub mod summary;

pub use config::ServerConfig;
pub use connection::Connection;
pub use error::{ServerError, ServerResult};
pub use server::{Server, ServerDeps};
pub use session::{Session, SessionManager};
