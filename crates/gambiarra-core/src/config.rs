//! Per-session configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::OperatingMode;

/// Configuration carried in the `create_session` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Workspace root on the client side.
    pub working_directory: PathBuf,
    /// Auto-approve read-only tools.
    #[serde(default = "default_true")]
    pub auto_approve_reads: bool,
    /// Require explicit approval for write tools.
    #[serde(default = "default_true")]
    pub require_approval_for_writes: bool,
    /// Upper bound on concurrently open file reads.
    #[serde(default = "default_max_reads")]
    pub max_concurrent_file_reads: usize,
    /// Operating mode for the session.
    #[serde(default)]
    pub operating_mode: OperatingMode,
}

fn default_true() -> bool {
    true
}

fn default_max_reads() -> usize {
    5
}

impl SessionConfig {
    /// Create a config rooted at the given workspace directory with defaults.
    #[must_use]
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            auto_approve_reads: true,
            require_approval_for_writes: true,
            max_concurrent_file_reads: 5,
            operating_mode: OperatingMode::Code,
        }
    }

    /// Set the operating mode.
    #[must_use]
    pub fn with_mode(mut self, mode: OperatingMode) -> Self {
        self.operating_mode = mode;
        self
    }
}
