//! The uniform tool-result shape.
//!
//! Every tool execution on the client produces a [`ToolResult`] that
//! travels back to the server inside a `tool_result` frame.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ErrorCode;

/// Whether a tool execution succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Tool ran to completion.
    Success,
    /// Tool failed; `error` carries the details.
    Error,
}

/// Structured error attached to a failed [`ToolResult`].
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ToolError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable explanation.
    pub message: String,
    /// Optional structured details (paths, limits, offending values).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Success or error.
    pub status: ToolStatus,
    /// Payload on success (tool-specific shape).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Side-band facts about the execution (byte counts, paths, timings).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Error details when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResult {
    /// Create a successful result with a data payload.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            status: ToolStatus::Success,
            data: Some(data),
            metadata: Map::new(),
            error: None,
        }
    }

    /// Create a successful result with no data payload.
    #[must_use]
    pub fn success_empty() -> Self {
        Self {
            status: ToolStatus::Success,
            data: None,
            metadata: Map::new(),
            error: None,
        }
    }

    /// Create an error result.
    #[must_use]
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            data: None,
            metadata: Map::new(),
            error: Some(ToolError {
                code,
                message: message.into(),
                details: Map::new(),
            }),
        }
    }

    /// Attach a metadata key.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach a structured detail to the error, if any.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details.insert(key.into(), value);
        }
        self
    }

    /// Check if the tool succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// The error message, if this is a failure.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
