//! Approval request/response types and the user-decision trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use gambiarra_core::{RequestId, RiskLevel, SessionId};
use gambiarra_protocol::ApprovalDecision;

/// A pending tool-approval request on the client.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    /// Correlation id from the server.
    pub request_id: RequestId,
    /// Tool name.
    pub tool_name: String,
    /// Wire-shaped parameters (`{"args": …}`).
    pub parameters: Value,
    /// Description shown to the approver, possibly augmented with a
    /// stale-context warning or guidance banner.
    pub description: String,
    /// Risk level after mode revision.
    pub risk_level: RiskLevel,
    /// Whether the registry marks the tool approval-required.
    pub requires_approval: bool,
    /// Owning session.
    pub session_id: SessionId,
    /// When the request arrived.
    pub created_at: DateTime<Utc>,
}

/// The verdict produced by the pipeline.
#[derive(Debug, Clone)]
pub struct ApprovalResponse {
    /// The decision.
    pub decision: ApprovalDecision,
    /// Optional reason or guidance.
    pub feedback: Option<String>,
    /// Replacement parameters for `approved_with_modification`.
    pub modified_parameters: Option<Map<String, Value>>,
}

impl ApprovalResponse {
    /// Approve as requested.
    #[must_use]
    pub fn approved() -> Self {
        Self {
            decision: ApprovalDecision::Approved,
            feedback: None,
            modified_parameters: None,
        }
    }

    /// Approve with a note.
    #[must_use]
    pub fn approved_with_feedback(feedback: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecision::Approved,
            feedback: Some(feedback.into()),
            modified_parameters: None,
        }
    }

    /// Deny with a reason.
    #[must_use]
    pub fn denied(feedback: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecision::Denied,
            feedback: Some(feedback.into()),
            modified_parameters: None,
        }
    }
}

/// Presents approval requests that need a human decision.
///
/// Frontends (console, tests) implement this to provide their own
/// approval UX. The pipeline only calls it after every automatic gate has
/// passed on the request.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Present a request and wait for the decision.
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResponse;
}
