//! The file-system and command sandboxes.
//!
//! Both are built once per client process and shared read-only. Nothing
//! reaches a tool implementation without passing them first.

pub mod command;
pub mod path;

pub use command::CommandSandbox;
pub use path::{PathSandbox, SecurityViolation};
