//! Policy evaluation: fixed block rules and configurable auto-approval.

use serde_json::Value;
use std::sync::Arc;

use gambiarra_core::RiskLevel;

use crate::approval::request::ApprovalRequest;
use crate::sandbox::CommandSandbox;

/// Tools trusted for auto-approval when the session allows reads.
const TRUSTED_READ_TOOLS: &[&str] = &["read_file", "list_code_definition_names"];

/// Listing tools trusted for auto-approval.
const TRUSTED_LIST_TOOLS: &[&str] = &["list_files", "search_files"];

/// Why a request was auto-approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoApprovalReason {
    /// Risk level is low or minimal for a trusted low-risk tool.
    LowRisk,
    /// Tool is in the trusted read/list set.
    TrustedTool,
}

impl AutoApprovalReason {
    /// Stable string used in approval feedback.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowRisk => "low_risk",
            Self::TrustedTool => "trusted_tool",
        }
    }
}

/// Fixed block rules plus configurable auto-approve rules.
pub struct PolicyEngine {
    commands: Arc<CommandSandbox>,
    auto_approve_low_risk: bool,
    auto_approve_reads: bool,
    auto_approve_lists: bool,
}

impl PolicyEngine {
    /// Create a policy engine.
    #[must_use]
    pub fn new(
        commands: Arc<CommandSandbox>,
        auto_approve_low_risk: bool,
        auto_approve_reads: bool,
        auto_approve_lists: bool,
    ) -> Self {
        Self {
            commands,
            auto_approve_low_risk,
            auto_approve_reads,
            auto_approve_lists,
        }
    }

    /// Fixed block rules. `execute_command` requests whose command fails
    /// the command sandbox are denied outright, before any user sees them.
    #[must_use]
    pub fn should_block(&self, request: &ApprovalRequest) -> Option<String> {
        if request.tool_name != "execute_command" {
            return None;
        }
        let command = request
            .parameters
            .get("args")
            .and_then(|args| args.get("command"))
            .and_then(Value::as_str)
            .unwrap_or("");
        match self.commands.check(command) {
            Ok(()) => None,
            Err(_) => Some("Command execution blocked by security policy".to_string()),
        }
    }

    /// Configurable auto-approve rules.
    #[must_use]
    pub fn auto_approval_reason(&self, request: &ApprovalRequest) -> Option<AutoApprovalReason> {
        if self.auto_approve_low_risk
            && !request.requires_approval
            && matches!(request.risk_level, RiskLevel::Low | RiskLevel::Minimal)
        {
            return Some(AutoApprovalReason::LowRisk);
        }

        if self.auto_approve_reads && TRUSTED_READ_TOOLS.contains(&request.tool_name.as_str()) {
            return Some(AutoApprovalReason::TrustedTool);
        }

        if self.auto_approve_lists && TRUSTED_LIST_TOOLS.contains(&request.tool_name.as_str()) {
            return Some(AutoApprovalReason::TrustedTool);
        }

        None
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("auto_approve_low_risk", &self.auto_approve_low_risk)
            .field("auto_approve_reads", &self.auto_approve_reads)
            .field("auto_approve_lists", &self.auto_approve_lists)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gambiarra_core::{RequestId, SessionId};
    use serde_json::json;

    fn request(tool_name: &str, parameters: Value, risk_level: RiskLevel) -> ApprovalRequest {
        ApprovalRequest {
            request_id: RequestId::new(),
            tool_name: tool_name.to_string(),
            parameters,
            description: String::new(),
            risk_level,
            requires_approval: risk_level.requires_approval(),
            session_id: SessionId::new(),
            created_at: Utc::now(),
        }
    }

    fn engine() -> PolicyEngine {
        PolicyEngine::new(Arc::new(CommandSandbox::new()), true, true, true)
    }

    #[test]
    fn test_blocks_catastrophic_command() {
        let engine = engine();
        let request = request(
            "execute_command",
            json!({"args": {"command": "rm -rf /"}}),
            RiskLevel::High,
        );
        let reason = engine.should_block(&request).unwrap();
        assert_eq!(reason, "Command execution blocked by security policy");
    }

    #[test]
    fn test_safe_command_not_blocked() {
        let engine = engine();
        let request = request(
            "execute_command",
            json!({"args": {"command": "cargo test"}}),
            RiskLevel::High,
        );
        assert!(engine.should_block(&request).is_none());
    }

    #[test]
    fn test_non_command_tools_never_blocked() {
        let engine = engine();
        let request = request(
            "write_to_file",
            json!({"args": {"path": "a", "content": "b", "line_count": 1}}),
            RiskLevel::High,
        );
        assert!(engine.should_block(&request).is_none());
    }

    #[test]
    fn test_auto_approves_low_risk_reads() {
        let engine = engine();
        let request = request(
            "read_file",
            json!({"args": {"file": {"path": "a.txt"}}}),
            RiskLevel::Low,
        );
        assert_eq!(
            engine.auto_approval_reason(&request),
            Some(AutoApprovalReason::LowRisk)
        );
    }

    #[test]
    fn test_never_auto_approves_writes() {
        let engine = engine();
        let request = request(
            "write_to_file",
            json!({"args": {"path": "a", "content": "b", "line_count": 1}}),
            RiskLevel::High,
        );
        assert!(engine.auto_approval_reason(&request).is_none());
    }

    #[test]
    fn test_reads_disabled() {
        let engine = PolicyEngine::new(Arc::new(CommandSandbox::new()), false, false, false);
        let request = request(
            "read_file",
            json!({"args": {"file": {"path": "a.txt"}}}),
            RiskLevel::Low,
        );
        assert!(engine.auto_approval_reason(&request).is_none());
    }
}
