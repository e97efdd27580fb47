//! The frame taxonomy.
//!
//! Every frame has a `type` tag; frames that belong to a session carry its
//! `session_id`. Unknown fields from newer peers are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use gambiarra_core::{ErrorCode, ExecutionId, RequestId, RiskLevel, SessionConfig, SessionId, ToolResult};

/// Client self-description sent in the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client platform (e.g. "rust").
    pub platform: String,
    /// Client version.
    pub version: String,
    /// Capability strings (e.g. "file_operations", "command_execution").
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Server self-description sent in the handshake ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server version.
    pub version: String,
    /// Names of every registered tool.
    pub available_tools: Vec<String>,
}

/// A user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTurn {
    /// The user's message.
    pub content: String,
    /// Optional base64 images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// One streamed piece of an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseChunk {
    /// Token text; empty on the terminating chunk.
    pub content: String,
    /// True exactly once per turn, on the final chunk.
    pub is_complete: bool,
}

/// Tool description inside a `tool_approval_request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// Wire-shaped parameters (`{"args": …}`).
    pub parameters: Value,
    /// Human-readable description shown to the approver.
    pub description: String,
    /// Risk level, possibly revised by the mode filter.
    pub risk_level: RiskLevel,
    /// Whether the registry marks this tool approval-required.
    pub requires_approval: bool,
}

/// Tool invocation inside an `execute_tool` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name.
    pub name: String,
    /// Wire-shaped parameters (`{"args": …}`).
    pub parameters: Value,
}

/// Verdict on a tool-approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Run the tool as requested.
    Approved,
    /// Do not run the tool.
    Denied,
    /// Run the tool with `modified_parameters` substituted.
    ApprovedWithModification,
}

impl ApprovalDecision {
    /// Whether this decision permits execution.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved | Self::ApprovedWithModification)
    }
}

/// Out-of-band error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorPayload {
    /// Create an error payload without details.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }
}

/// A protocol frame. One JSON object per line on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// C→S handshake.
    Connect {
        /// Protocol version string.
        protocol_version: String,
        /// Client self-description.
        client_info: ClientInfo,
    },
    /// S→C handshake ack.
    Connected {
        /// Server self-description.
        server_info: ServerInfo,
    },
    /// C→S open a session.
    CreateSession {
        /// Session configuration.
        config: SessionConfig,
    },
    /// S→C session ack. Resets client-side conversation and repetition state.
    SessionCreated {
        /// The new session's id.
        session_id: SessionId,
        /// Readiness status (informational).
        status: String,
    },
    /// C→S user turn.
    UserMessage {
        /// Session id.
        session_id: SessionId,
        /// The user's turn.
        message: UserTurn,
    },
    /// S→C streamed assistant tokens.
    AiResponseChunk {
        /// Session id.
        session_id: SessionId,
        /// The chunk.
        chunk: ResponseChunk,
    },
    /// S→C request client-side approval of a tool call.
    ToolApprovalRequest {
        /// Session id.
        session_id: SessionId,
        /// Correlation id, unique per session.
        request_id: RequestId,
        /// The tool being requested.
        tool: ToolSpec,
    },
    /// C→S approval verdict.
    ToolApprovalResponse {
        /// Session id.
        session_id: SessionId,
        /// Correlation id echoed from the request.
        request_id: RequestId,
        /// The verdict.
        decision: ApprovalDecision,
        /// Optional reason / guidance.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feedback: Option<String>,
        /// Replacement parameters for `approved_with_modification`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modified_parameters: Option<Map<String, Value>>,
    },
    /// S→C execute an approved tool.
    ExecuteTool {
        /// Session id.
        session_id: SessionId,
        /// Correlation id for the result.
        execution_id: ExecutionId,
        /// The tool to run.
        tool: ToolInvocation,
    },
    /// C→S execution result.
    ToolResult {
        /// Session id.
        session_id: SessionId,
        /// Correlation id echoed from `execute_tool`.
        execution_id: ExecutionId,
        /// The uniform result.
        result: ToolResult,
    },
    /// S→C advisory ack of a `tool_result`.
    ToolResultReceived {
        /// Session id.
        session_id: SessionId,
        /// Correlation id.
        execution_id: ExecutionId,
        /// Processing status (informational).
        status: String,
    },
    /// S→C summary of a denial that was fed back into the conversation.
    ToolDenied {
        /// Session id.
        session_id: SessionId,
        /// The denied tool.
        tool_name: String,
        /// Why it was denied.
        reason: String,
    },
    /// Out-of-band failure, either direction.
    Error {
        /// The error.
        error: ErrorPayload,
    },
}

impl Frame {
    /// The session this frame belongs to, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::UserMessage { session_id, .. }
            | Self::AiResponseChunk { session_id, .. }
            | Self::ToolApprovalRequest { session_id, .. }
            | Self::ToolApprovalResponse { session_id, .. }
            | Self::ExecuteTool { session_id, .. }
            | Self::ToolResult { session_id, .. }
            | Self::ToolResultReceived { session_id, .. }
            | Self::ToolDenied { session_id, .. }
            | Self::SessionCreated { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// Short name of the frame type for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Connected { .. } => "connected",
            Self::CreateSession { .. } => "create_session",
            Self::SessionCreated { .. } => "session_created",
            Self::UserMessage { .. } => "user_message",
            Self::AiResponseChunk { .. } => "ai_response_chunk",
            Self::ToolApprovalRequest { .. } => "tool_approval_request",
            Self::ToolApprovalResponse { .. } => "tool_approval_response",
            Self::ExecuteTool { .. } => "execute_tool",
            Self::ToolResult { .. } => "tool_result",
            Self::ToolResultReceived { .. } => "tool_result_received",
            Self::ToolDenied { .. } => "tool_denied",
            Self::Error { .. } => "error",
        }
    }
}
