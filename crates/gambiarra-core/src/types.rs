//! Common types used throughout Gambiarra.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a session ID from a UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a tool-approval round-trip.
///
/// Round-trips unchanged between `tool_approval_request` and
/// `tool_approval_response`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an approved tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    /// Create a new random execution ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Risk level classification for tools.
///
/// Ordered from least to most dangerous, so `<`/`>` comparisons follow
/// intuition (`Minimal < Low < Medium < High`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No meaningful side effects (completion signals, questions).
    Minimal,
    /// Read-only workspace access.
    Low,
    /// Bounded mutation (targeted edits with backups).
    Medium,
    /// Unbounded mutation or process execution.
    High,
}

impl RiskLevel {
    /// Check if this risk level requires user approval by default.
    #[must_use]
    pub fn requires_approval(&self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimal => write!(f, "minimal"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(Self::Minimal),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// Operating mode for a session.
///
/// Each mode maps to a tool allow-set and parameter restrictions enforced
/// by the server-side mode filter before a tool call ever reaches the
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Full coding assistant with all tools available.
    Code,
    /// Question answering with limited file reading.
    Ask,
    /// System design and architecture analysis (read-only).
    Architect,
    /// Debugging with diagnostic commands (no file writing).
    Debug,
    /// Code review (read-only).
    Review,
}

impl OperatingMode {
    /// Human-readable description of the mode.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Code => "Full coding assistant with all tools available",
            Self::Ask => "Question answering with limited file reading capabilities",
            Self::Architect => "System design and architecture analysis (read-only)",
            Self::Debug => "Debugging mode with diagnostic tools (no file writing)",
            Self::Review => "Code review mode with analysis tools (read-only)",
        }
    }
}

impl Default for OperatingMode {
    fn default() -> Self {
        Self::Code
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => write!(f, "code"),
            Self::Ask => write!(f, "ask"),
            Self::Architect => write!(f, "architect"),
            Self::Debug => write!(f, "debug"),
            Self::Review => write!(f, "review"),
        }
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "ask" => Ok(Self::Ask),
            "architect" => Ok(Self::Architect),
            "debug" => Ok(Self::Debug),
            "review" => Ok(Self::Review),
            other => Err(format!("unknown operating mode: {other}")),
        }
    }
}
