//! Loop detection for identical consecutive tool calls.

use serde_json::{Value, json};
use tracing::info;

/// Outcome of a repetition check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepetitionCheck {
    /// Execution may proceed.
    Allowed,
    /// The limit was hit; the call should be denied with this reason.
    LimitReached {
        /// Explanation for the denial feedback.
        reason: String,
    },
}

/// Detects consecutive identical tool calls.
///
/// Calls are compared by a canonical JSON rendering of
/// `(tool_name, parameters)` with sorted keys. When the limit fires, the
/// internal state resets so the user can guide the model past the loop
/// and the next identical call is allowed again.
#[derive(Debug)]
pub struct RepetitionDetector {
    limit: u32,
    previous: Option<String>,
    consecutive: u32,
}

impl RepetitionDetector {
    /// Create a detector. A limit of 0 disables detection.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            previous: None,
            consecutive: 0,
        }
    }

    /// Check one tool call.
    pub fn check(&mut self, tool_name: &str, parameters: &Value) -> RepetitionCheck {
        // Scroll actions legitimately repeat; exempt them. The tool is not
        // currently registered, so this path is kept for forward
        // compatibility.
        if is_browser_scroll(tool_name, parameters) {
            return RepetitionCheck::Allowed;
        }

        let current = canonical(tool_name, parameters);
        if self.previous.as_deref() == Some(current.as_str()) {
            self.consecutive += 1;
        } else {
            self.consecutive = 1;
            self.previous = Some(current);
        }

        if self.limit > 0 && self.consecutive >= self.limit {
            self.consecutive = 0;
            self.previous = None;
            return RepetitionCheck::LimitReached {
                reason: format!(
                    "AI is repeating the same '{tool_name}' tool call. This may indicate it's stuck in a loop."
                ),
            };
        }

        RepetitionCheck::Allowed
    }

    /// Reset the detector (new session).
    pub fn reset(&mut self) {
        self.previous = None;
        self.consecutive = 0;
        info!("tool repetition detector reset");
    }
}

/// Canonical JSON rendering with sorted keys.
///
/// `serde_json`'s map type keeps keys sorted, so serializing the composed
/// object is already canonical.
fn canonical(tool_name: &str, parameters: &Value) -> String {
    json!({ "name": tool_name, "parameters": parameters }).to_string()
}

fn is_browser_scroll(tool_name: &str, parameters: &Value) -> bool {
    if tool_name != "browser_action" {
        return false;
    }
    let action = parameters
        .get("args")
        .unwrap_or(parameters)
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("");
    matches!(action, "scroll_down" | "scroll_up")
}
