//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use gambiarra_core::OperatingMode;

/// Protocol version spoken by this build.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Configuration for the workspace client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Address of the orchestration server (`host:port`).
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    /// Workspace root; no tool may reach outside it.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Auto-approve read-only tools.
    #[serde(default = "default_true")]
    pub auto_approve_reads: bool,
    /// Identical consecutive tool calls allowed before the repetition
    /// detector denies.
    #[serde(default = "default_repetition_limit")]
    pub repetition_limit: u32,
    /// Frame-read timeout while awaiting mid-turn traffic, seconds.
    #[serde(default = "default_frame_read_timeout")]
    pub frame_read_timeout_secs: u64,
    /// Quiet period after a completed response before the turn is
    /// considered over, milliseconds.
    #[serde(default = "default_turn_idle_grace")]
    pub turn_idle_grace_ms: u64,
    /// Wall-clock timeout for `execute_command`, seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Operating mode requested at session creation.
    #[serde(default)]
    pub operating_mode: OperatingMode,
}

fn default_server_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_repetition_limit() -> u32 {
    3
}

fn default_frame_read_timeout() -> u64 {
    30
}

fn default_turn_idle_grace() -> u64 {
    1500
}

fn default_command_timeout() -> u64 {
    30
}

impl ClientConfig {
    /// Config rooted at a workspace with everything else defaulted.
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            server_addr: default_server_addr(),
            workspace_root: workspace_root.into(),
            auto_approve_reads: true,
            repetition_limit: default_repetition_limit(),
            frame_read_timeout_secs: default_frame_read_timeout(),
            turn_idle_grace_ms: default_turn_idle_grace(),
            command_timeout_secs: default_command_timeout(),
            operating_mode: OperatingMode::Code,
        }
    }

    /// The frame-read timeout as a [`Duration`].
    #[must_use]
    pub fn frame_read_timeout(&self) -> Duration {
        Duration::from_secs(self.frame_read_timeout_secs)
    }

    /// The turn-idle grace as a [`Duration`].
    #[must_use]
    pub fn turn_idle_grace(&self) -> Duration {
        Duration::from_millis(self.turn_idle_grace_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
