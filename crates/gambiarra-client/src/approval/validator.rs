//! Wire-shape parameter validation and the mistake budget.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use gambiarra_protocol::unwrap_parameters;
use gambiarra_tools::{ToolRegistry, validate_parameters};

/// Consecutive mistakes that trigger the guidance gate.
pub const GUIDANCE_THRESHOLD: u32 = 3;

/// Retained error records.
const MAX_ERROR_HISTORY: usize = 50;

/// Validates incoming wire-shaped tool parameters.
#[derive(Debug)]
pub struct ParameterValidator;

impl ParameterValidator {
    /// Validate the `{"args": …}` wire shape and the values inside it.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation.
    pub fn validate(
        registry: &ToolRegistry,
        tool_name: &str,
        parameters: &Value,
    ) -> Result<(), String> {
        let Some(def) = registry.get(tool_name) else {
            return Err(format!("Unknown tool: {tool_name}"));
        };

        let Some(args) = parameters.get("args") else {
            return Err(format!("{tool_name} requires 'args' parameter"));
        };
        if !args.is_object() {
            return Err("'args' parameter must be an object".to_string());
        }

        if tool_name == "read_file" {
            let Some(file) = args.get("file") else {
                return Err("read_file args must contain 'file' parameter".to_string());
            };
            if !file.is_object() {
                return Err("'file' parameter must be an object".to_string());
            }
            if file.get("path").is_none() {
                return Err("read_file file parameter must contain 'path'".to_string());
            }
        }

        let flat = unwrap_parameters(tool_name, parameters);
        validate_parameters(def, &flat).map_err(|e| e.to_string())
    }
}

/// One recorded tool mistake.
#[derive(Debug, Clone)]
pub struct ToolMistake {
    /// Tool name.
    pub tool_name: String,
    /// Mistake category (`validation_error`, `repetition_error`,
    /// `execution_error`).
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
    /// When the mistake happened.
    pub timestamp: DateTime<Utc>,
}

/// Counter of consecutive tool-call failures.
///
/// When the count reaches [`GUIDANCE_THRESHOLD`], even auto-approvable
/// requests escalate to manual approval until a success or an explicit
/// reset.
#[derive(Debug, Default)]
pub struct MistakeTracker {
    history: Vec<ToolMistake>,
    consecutive: u32,
}

impl MistakeTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed tool call.
    pub fn record_error(&mut self, tool_name: &str, error_type: &str, message: &str) {
        warn!(tool = tool_name, error_type, message, "tool mistake recorded");
        self.history.push(ToolMistake {
            tool_name: tool_name.to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        if self.history.len() > MAX_ERROR_HISTORY {
            let excess = self.history.len() - MAX_ERROR_HISTORY;
            self.history.drain(..excess);
        }
        self.consecutive += 1;
    }

    /// Record a successful tool call, clearing the consecutive counter.
    pub fn record_success(&mut self, tool_name: &str) {
        debug!(tool = tool_name, "tool success recorded");
        self.consecutive = 0;
    }

    /// Whether the guidance gate should engage.
    #[must_use]
    pub fn should_request_guidance(&self) -> bool {
        self.consecutive >= GUIDANCE_THRESHOLD
    }

    /// Current consecutive mistake count.
    #[must_use]
    pub fn consecutive_mistakes(&self) -> u32 {
        self.consecutive
    }

    /// The most recent mistakes, newest last.
    #[must_use]
    pub fn recent_errors(&self, count: usize) -> &[ToolMistake] {
        let start = self.history.len().saturating_sub(count);
        &self.history[start..]
    }

    /// Clear the consecutive counter (user said "reset").
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}
