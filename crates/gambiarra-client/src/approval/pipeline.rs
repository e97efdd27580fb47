//! The ordered approval gates.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{info, warn};

use gambiarra_context::FileContextTracker;
use gambiarra_core::{RiskLevel, ToolResult};
use gambiarra_tools::ToolRegistry;

use crate::approval::policy::PolicyEngine;
use crate::approval::repetition::{RepetitionCheck, RepetitionDetector};
use crate::approval::request::{ApprovalHandler, ApprovalRequest, ApprovalResponse};
use crate::approval::validator::{MistakeTracker, ParameterValidator};

/// Tools whose target file is probed for staleness before approval.
const FILE_CONTEXT_TOOLS: &[&str] = &[
    "read_file",
    "write_to_file",
    "search_and_replace",
    "insert_content",
];

/// Tuning for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Auto-approve low-risk trusted tools.
    pub auto_approve_low_risk: bool,
    /// Auto-approve read operations.
    pub auto_approve_reads: bool,
    /// Auto-approve listing operations.
    pub auto_approve_lists: bool,
    /// Identical consecutive calls allowed before denial.
    pub repetition_limit: u32,
    /// Consecutive auto-approvals allowed before forcing manual review.
    pub max_consecutive_auto_approvals: u32,
    /// Estimated-cost ceiling (USD) above which auto-approval stops.
    pub cost_ceiling: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_approve_low_risk: true,
            auto_approve_reads: true,
            auto_approve_lists: true,
            repetition_limit: 3,
            max_consecutive_auto_approvals: 10,
            cost_ceiling: 5.0,
        }
    }
}

/// The client-side approval pipeline.
///
/// Gates run in a fixed order: parameter validation, repetition
/// detection, the stale-context probe, block rules, the guidance gate,
/// auto-approval, and finally the user.
pub struct ApprovalPipeline {
    registry: Arc<ToolRegistry>,
    tracker: Arc<Mutex<FileContextTracker>>,
    handler: Arc<dyn ApprovalHandler>,
    policy: PolicyEngine,
    repetition: RepetitionDetector,
    mistakes: MistakeTracker,
    config: PipelineConfig,
    consecutive_auto_approvals: u32,
    cost_estimate: f64,
}

impl ApprovalPipeline {
    /// Assemble the pipeline.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        tracker: Arc<Mutex<FileContextTracker>>,
        handler: Arc<dyn ApprovalHandler>,
        policy: PolicyEngine,
        config: PipelineConfig,
    ) -> Self {
        let repetition = RepetitionDetector::new(config.repetition_limit);
        Self {
            registry,
            tracker,
            handler,
            policy,
            repetition,
            mistakes: MistakeTracker::new(),
            config,
            consecutive_auto_approvals: 0,
            cost_estimate: 0.0,
        }
    }

    /// Run one request through every gate.
    pub async fn process(&mut self, mut request: ApprovalRequest) -> ApprovalResponse {
        // 1. Parameter validation
        if let Err(problem) =
            ParameterValidator::validate(&self.registry, &request.tool_name, &request.parameters)
        {
            warn!(tool = %request.tool_name, %problem, "parameter validation failed");
            self.mistakes
                .record_error(&request.tool_name, "validation_error", &problem);
            return ApprovalResponse::denied(format!("Parameter validation failed: {problem}"));
        }

        // 2. Repetition detection
        if let RepetitionCheck::LimitReached { reason } =
            self.repetition.check(&request.tool_name, &request.parameters)
        {
            warn!(tool = %request.tool_name, "tool repetition detected");
            self.mistakes
                .record_error(&request.tool_name, "repetition_error", &reason);
            return ApprovalResponse::denied(reason);
        }

        // 3. Stale-context probe
        if let Some(warning) = self.stale_warning(&request) {
            warn!(%warning, "file context may be stale");
            request.description = format!("{}\n\n{warning}", request.description);
        }

        // 4. Block rules
        if let Some(reason) = self.policy.should_block(&request) {
            warn!(tool = %request.tool_name, "request blocked by policy");
            self.mistakes
                .record_error(&request.tool_name, "security_error", &reason);
            return ApprovalResponse::denied(reason);
        }

        // 5. Guidance gate: repeated mistakes force a human decision even
        // for otherwise auto-approvable requests.
        if self.mistakes.should_request_guidance() {
            return self.request_guidance(request).await;
        }

        // 6. Auto-approval, bounded by the consecutive cap and the cost
        // ceiling.
        if self.consecutive_auto_approvals < self.config.max_consecutive_auto_approvals
            && self.cost_estimate <= self.config.cost_ceiling
        {
            if let Some(reason) = self.policy.auto_approval_reason(&request) {
                self.consecutive_auto_approvals += 1;
                info!(tool = %request.tool_name, reason = reason.as_str(), "auto-approved");
                return ApprovalResponse::approved_with_feedback(format!(
                    "Auto-approved: {}",
                    reason.as_str()
                ));
            }
        }

        // 7. Manual approval
        self.consecutive_auto_approvals = 0;
        let response = self.handler.request_approval(&request).await;
        self.count_denial(&request.tool_name, &response);
        response
    }

    /// Record the outcome of an executed tool into the mistake budget.
    pub fn record_execution(&mut self, tool_name: &str, result: &ToolResult) {
        if result.is_success() {
            self.mistakes.record_success(tool_name);
        } else {
            let message = result.error_message().unwrap_or("Tool execution failed");
            self.mistakes
                .record_error(tool_name, "execution_error", message);
        }
    }

    /// Reset per-session state (`session_created` arrived).
    pub fn reset_session_state(&mut self) {
        self.repetition.reset();
        self.consecutive_auto_approvals = 0;
        self.cost_estimate = 0.0;
    }

    /// Feed the running cost estimate.
    ///
    /// The numeric estimator upstream is currently a stub; the ceiling
    /// check in [`ApprovalPipeline::process`] consumes whatever lands
    /// here.
    pub fn update_cost_estimate(&mut self, additional_cost: f64) {
        self.cost_estimate += additional_cost;
    }

    /// Current consecutive mistake count (for status displays).
    #[must_use]
    pub fn consecutive_mistakes(&self) -> u32 {
        self.mistakes.consecutive_mistakes()
    }

    fn stale_warning(&self, request: &ApprovalRequest) -> Option<String> {
        if !FILE_CONTEXT_TOOLS.contains(&request.tool_name.as_str()) {
            return None;
        }
        let path = file_target(&request.tool_name, &request.parameters)?;
        let freshness = self
            .tracker
            .lock()
            .ok()?
            .check(std::path::Path::new(&path));
        freshness.stale.then(|| {
            format!(
                "\u{26a0}\u{fe0f} File context may be stale: {path} - {}",
                freshness.reason
            )
        })
    }

    async fn request_guidance(&mut self, request: ApprovalRequest) -> ApprovalResponse {
        let mut banner = format!(
            "Multiple tool execution errors detected ({} consecutive mistakes).\n\nRecent errors:\n",
            self.mistakes.consecutive_mistakes()
        );
        for error in self.mistakes.recent_errors(3) {
            banner.push_str(&format!("- {}: {}\n", error.tool_name, error.message));
        }
        banner.push_str(
            "\nThe AI may need guidance to proceed. Approve to continue, deny to redirect, \
             or include the word 'reset' in feedback to clear the mistake counter.",
        );

        let guided = ApprovalRequest {
            description: format!("GUIDANCE NEEDED: {}\n\n{banner}", request.description),
            risk_level: RiskLevel::High,
            requires_approval: true,
            ..request
        };

        self.consecutive_auto_approvals = 0;
        let response = self.handler.request_approval(&guided).await;

        if response.decision.is_approved()
            && response
                .feedback
                .as_deref()
                .is_some_and(|f| f.to_lowercase().contains("reset"))
        {
            self.mistakes.reset();
            info!("mistake counter reset by user feedback");
        }

        self.count_denial(&guided.tool_name, &response);
        response
    }

    /// A user denial counts toward the mistake budget like any other
    /// failed call.
    fn count_denial(&mut self, tool_name: &str, response: &ApprovalResponse) {
        if response.decision == gambiarra_protocol::ApprovalDecision::Denied {
            let reason = response
                .feedback
                .as_deref()
                .unwrap_or("Tool execution denied by user");
            self.mistakes.record_error(tool_name, "user_denial", reason);
        }
    }
}

/// Extract the target path from wire-shaped parameters.
fn file_target(tool_name: &str, parameters: &Value) -> Option<String> {
    let args = parameters.get("args")?;
    let path = if tool_name == "read_file" {
        args.get("file")?.get("path")?
    } else {
        args.get("path")?
    };
    path.as_str().map(ToString::to_string)
}
