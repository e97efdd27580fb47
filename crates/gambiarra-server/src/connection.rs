//! Per-connection frame routing and the agentic loop.
//!
//! One connection carries one session. Within the session everything is
//! strictly sequential: one turn at a time, one tool round-trip in flight
//! at a time. Frames that arrive while the loop awaits a correlated reply
//! are processed in order through the same dispatch.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use gambiarra_core::{ErrorCode, ExecutionId, RequestId, SessionConfig, ToolResult};
use gambiarra_llm::{ChatMessage, ChatRole, LlmProvider};
use gambiarra_protocol::{
    ApprovalDecision, ErrorPayload, Frame, FrameTransport, ProtocolError, ResponseChunk,
    ServerInfo, ToolInvocation, ToolSpec, wrap_parameters,
};
use gambiarra_tools::{ModeVerdict, ParsedToolCall};

use crate::error::{ServerError, ServerResult};
use crate::prompt::build_system_prompt;
use crate::server::ServerDeps;
use crate::session::{PendingExecution, Session};
use crate::summary::{denial_message, summarize_tool_result};

/// Per-turn cap on re-injected tool results.
const SAFETY_BUDGET: usize = 10;

/// One client connection and its session.
pub struct Connection<T> {
    transport: FrameTransport<T>,
    deps: Arc<ServerDeps>,
    session: Option<Session>,
}

impl<T: AsyncRead + AsyncWrite + Send> Connection<T> {
    /// Wrap an accepted stream.
    pub fn new(stream: T, deps: Arc<ServerDeps>) -> Self {
        Self {
            transport: FrameTransport::new(stream),
            deps,
            session: None,
        }
    }

    /// Drive the connection until the channel closes or the session goes
    /// idle past the timeout. Tears the session down on exit; pending
    /// approvals and executions are discarded, never retried.
    pub async fn serve(mut self) -> ServerResult<()> {
        let outcome = self.run().await;
        if let Some(session) = self.session.take() {
            info!(session_id = %session.id, "tearing down session");
            self.deps.sessions.remove(&session.id);
        }
        match outcome {
            Err(ServerError::ConnectionClosed) => Ok(()),
            other => other,
        }
    }

    async fn run(&mut self) -> ServerResult<()> {
        let idle = Duration::from_secs(self.deps.config.session_timeout_secs);
        loop {
            let frame = match tokio::time::timeout(idle, self.recv_frame()).await {
                Err(_elapsed) => {
                    info!("session idle past timeout, closing");
                    return Ok(());
                },
                Ok(Ok(frame)) => frame,
                Ok(Err(ServerError::ConnectionClosed)) => return Ok(()),
                Ok(Err(e)) => return Err(e),
            };
            self.dispatch(frame).await?;
        }
    }

    /// Receive the next frame, answering malformed input with error
    /// frames instead of dying.
    async fn recv_frame(&mut self) -> ServerResult<Frame> {
        loop {
            match self.transport.recv().await {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => return Err(ServerError::ConnectionClosed),
                Err(ProtocolError::InvalidFrame(e)) => {
                    warn!(error = %e, "malformed frame");
                    self.send_error(ErrorCode::InvalidJson, "Invalid JSON in message")
                        .await?;
                },
                Err(ProtocolError::UnrecognizedFrame { frame_type }) => {
                    let kind = frame_type.unwrap_or_else(|| "<missing>".to_string());
                    warn!(%kind, "unknown message type");
                    self.send_error(
                        ErrorCode::UnknownMessageType,
                        format!("Unknown message type: {kind}"),
                    )
                    .await?;
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn dispatch(&mut self, frame: Frame) -> ServerResult<()> {
        debug!(kind = frame.kind(), "dispatching frame");
        match frame {
            Frame::Connect {
                protocol_version, ..
            } => {
                debug!(%protocol_version, "client connected");
                self.transport
                    .send(&Frame::Connected {
                        server_info: ServerInfo {
                            version: env!("CARGO_PKG_VERSION").to_string(),
                            available_tools: self.deps.registry.names(),
                        },
                    })
                    .await?;
            },
            Frame::CreateSession { config } => {
                self.handle_create_session(config).await?;
            },
            Frame::UserMessage {
                session_id,
                message,
            } => {
                let Some(mut session) = self.session.take() else {
                    self.send_error(ErrorCode::MessageProcessingError, "No active session")
                        .await?;
                    return Ok(());
                };
                if session.id != session_id {
                    self.session = Some(session);
                    self.send_error(ErrorCode::MessageProcessingError, "Unknown session")
                        .await?;
                    return Ok(());
                }
                session.touch();
                let outcome = self.run_turn(&mut session, &message.content).await;
                self.session = Some(session);
                outcome?;
            },
            Frame::ToolApprovalResponse { request_id, .. } => {
                // No turn is awaiting this; the correlation is gone.
                self.send_error(
                    ErrorCode::ToolRequestNotFound,
                    format!("No pending tool request for {request_id}"),
                )
                .await?;
            },
            Frame::ToolResult { execution_id, .. } => {
                self.send_error(
                    ErrorCode::ToolRequestNotFound,
                    format!("No pending execution for {execution_id}"),
                )
                .await?;
            },
            Frame::Error { error } => {
                warn!(code = %error.code, message = %error.message, "client reported error");
            },
            other => {
                warn!(kind = other.kind(), "unexpected frame from client");
                self.send_error(
                    ErrorCode::MessageProcessingError,
                    format!("Unexpected frame: {}", other.kind()),
                )
                .await?;
            },
        }
        Ok(())
    }

    async fn handle_create_session(&mut self, config: SessionConfig) -> ServerResult<()> {
        let system_prompt = build_system_prompt(&config, &self.deps.registry);
        let session = Session::new(
            config,
            system_prompt,
            self.deps.config.max_conversation_tokens,
        );

        if let Err(active) = self.deps.sessions.register(&session) {
            self.send_error(
                ErrorCode::MessageProcessingError,
                format!("Session limit reached ({active} active)"),
            )
            .await?;
            return Ok(());
        }

        info!(session_id = %session.id, mode = %session.config.operating_mode, "session created");
        self.transport
            .send(&Frame::SessionCreated {
                session_id: session.id.clone(),
                status: "ready".to_string(),
            })
            .await?;
        self.session = Some(session);
        Ok(())
    }

    /// The agentic loop: stream a response, extract tool calls, get them
    /// approved and executed, re-inject results, repeat until a response
    /// has no tool calls or the safety budget is spent.
    async fn run_turn(&mut self, session: &mut Session, content: &str) -> ServerResult<()> {
        session.memory.add_user(content);

        loop {
            let Some(assistant_text) = self.stream_model_response(session).await? else {
                // Provider failure already surfaced as an error frame
                return Ok(());
            };
            session.memory.add_assistant(assistant_text.clone());

            let calls = self
                .deps
                .extractor
                .extract(&self.deps.registry, &assistant_text);
            if calls.is_empty() {
                return Ok(());
            }
            info!(count = calls.len(), "tool calls extracted");

            for call in calls {
                self.process_tool_call(session, call).await?;
            }

            if session.recent_tool_result_count() >= SAFETY_BUDGET {
                info!("safety budget reached, ending turn");
                return Ok(());
            }
        }
    }

    /// Stream one model response to the client, returning the accumulated
    /// text, or `None` when the provider failed and the turn must end.
    async fn stream_model_response(
        &mut self,
        session: &mut Session,
    ) -> ServerResult<Option<String>> {
        let mut messages = vec![ChatMessage::system(session.system_prompt.clone())];
        messages.extend(session.memory.export(true).into_iter().map(|m| ChatMessage {
            role: match m.role.as_str() {
                "assistant" => ChatRole::Assistant,
                "system" => ChatRole::System,
                _ => ChatRole::User,
            },
            content: m.content,
        }));

        let mut stream = match self.deps.provider.stream_completion(&messages).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "provider refused the request");
                self.send_error(ErrorCode::AiProcessingError, e.to_string())
                    .await?;
                return Ok(None);
            },
        };

        let mut assistant_text = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(token) => {
                    self.transport
                        .send(&Frame::AiResponseChunk {
                            session_id: session.id.clone(),
                            chunk: ResponseChunk {
                                content: token.clone(),
                                is_complete: false,
                            },
                        })
                        .await?;
                    assistant_text.push_str(&token);
                },
                Err(e) => {
                    warn!(error = %e, "provider stream failed mid-turn");
                    self.send_error(ErrorCode::AiProcessingError, e.to_string())
                        .await?;
                    return Ok(None);
                },
            }
        }

        self.transport
            .send(&Frame::AiResponseChunk {
                session_id: session.id.clone(),
                chunk: ResponseChunk {
                    content: String::new(),
                    is_complete: true,
                },
            })
            .await?;

        Ok(Some(assistant_text))
    }

    /// Run one tool call through mode filtering, approval, execution, and
    /// result re-injection.
    async fn process_tool_call(
        &mut self,
        session: &mut Session,
        call: ParsedToolCall,
    ) -> ServerResult<()> {
        let mode = session.config.operating_mode;

        let modified_risk =
            match self
                .deps
                .mode_filter
                .evaluate(&call.name, &call.parameters, mode)
            {
                ModeVerdict::Blocked { reason } => {
                    let reason = format!("Tool blocked by {mode} mode: {reason}");
                    info!(tool = %call.name, %reason, "mode filter denied tool call");
                    self.transport
                        .send(&Frame::ToolDenied {
                            session_id: session.id.clone(),
                            tool_name: call.name.clone(),
                            reason: reason.clone(),
                        })
                        .await?;
                    session
                        .memory
                        .add_assistant(denial_message(&call.name, &reason));
                    return Ok(());
                },
                ModeVerdict::Allowed { modified_risk } => modified_risk,
            };

        let risk_level = modified_risk.unwrap_or_else(|| self.deps.registry.risk_level(&call.name));
        let request_id = RequestId::new();
        session
            .pending_approvals
            .insert(request_id.clone(), call.clone());

        self.transport
            .send(&Frame::ToolApprovalRequest {
                session_id: session.id.clone(),
                request_id: request_id.clone(),
                tool: ToolSpec {
                    name: call.name.clone(),
                    parameters: wrap_parameters(&call.name, &call.parameters),
                    description: format!("Execute {} tool (mode: {mode})", call.name),
                    risk_level,
                    requires_approval: self.deps.registry.requires_approval(&call.name),
                },
            })
            .await?;

        let (decision, feedback, modified_parameters) =
            self.await_approval(&request_id).await?;
        session.pending_approvals.remove(&request_id);

        if decision.is_approved() {
            let parameters = modified_parameters
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| call.parameters.clone());
            self.execute_approved(session, &call.name, parameters).await
        } else {
            let reason =
                feedback.unwrap_or_else(|| "Tool execution denied by user".to_string());
            info!(tool = %call.name, %reason, "tool call denied");
            self.transport
                .send(&Frame::ToolDenied {
                    session_id: session.id.clone(),
                    tool_name: call.name.clone(),
                    reason: reason.clone(),
                })
                .await?;
            session
                .memory
                .add_assistant(denial_message(&call.name, &reason));
            Ok(())
        }
    }

    async fn execute_approved(
        &mut self,
        session: &mut Session,
        tool_name: &str,
        parameters: Map<String, Value>,
    ) -> ServerResult<()> {
        let execution_id = ExecutionId::new();
        session.pending_executions.insert(
            execution_id.clone(),
            PendingExecution {
                execution_id: execution_id.clone(),
                tool_name: tool_name.to_string(),
                parameters: parameters.clone(),
                started_at: chrono::Utc::now(),
            },
        );

        self.transport
            .send(&Frame::ExecuteTool {
                session_id: session.id.clone(),
                execution_id: execution_id.clone(),
                tool: ToolInvocation {
                    name: tool_name.to_string(),
                    parameters: wrap_parameters(tool_name, &parameters),
                },
            })
            .await?;

        let result = self.await_result(&execution_id).await?;
        session.pending_executions.remove(&execution_id);

        self.transport
            .send(&Frame::ToolResultReceived {
                session_id: session.id.clone(),
                execution_id,
                status: "processed".to_string(),
            })
            .await?;

        session
            .memory
            .add_assistant(summarize_tool_result(tool_name, &result));
        Ok(())
    }

    /// Await the approval verdict for one request, answering unrelated
    /// frames in order.
    async fn await_approval(
        &mut self,
        request_id: &RequestId,
    ) -> ServerResult<(ApprovalDecision, Option<String>, Option<Map<String, Value>>)> {
        loop {
            match self.recv_frame().await? {
                Frame::ToolApprovalResponse {
                    request_id: echoed,
                    decision,
                    feedback,
                    modified_parameters,
                    ..
                } => {
                    if echoed == *request_id {
                        return Ok((decision, feedback, modified_parameters));
                    }
                    self.send_error(
                        ErrorCode::ToolRequestNotFound,
                        format!("No pending tool request for {echoed}"),
                    )
                    .await?;
                },
                Frame::Error { error } => {
                    warn!(code = %error.code, "client error while awaiting approval");
                },
                other => {
                    warn!(kind = other.kind(), "unexpected frame while awaiting approval");
                    self.send_error(
                        ErrorCode::MessageProcessingError,
                        format!("Unexpected frame during approval: {}", other.kind()),
                    )
                    .await?;
                },
            }
        }
    }

    /// Await the result of one execution, answering unrelated frames in
    /// order.
    async fn await_result(&mut self, execution_id: &ExecutionId) -> ServerResult<ToolResult> {
        loop {
            match self.recv_frame().await? {
                Frame::ToolResult {
                    execution_id: echoed,
                    result,
                    ..
                } => {
                    if echoed == *execution_id {
                        return Ok(result);
                    }
                    self.send_error(
                        ErrorCode::ToolRequestNotFound,
                        format!("No pending execution for {echoed}"),
                    )
                    .await?;
                },
                Frame::Error { error } => {
                    warn!(code = %error.code, "client error while awaiting result");
                },
                other => {
                    warn!(kind = other.kind(), "unexpected frame while awaiting result");
                    self.send_error(
                        ErrorCode::MessageProcessingError,
                        format!("Unexpected frame during execution: {}", other.kind()),
                    )
                    .await?;
                },
            }
        }
    }

    async fn send_error(
        &mut self,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> ServerResult<()> {
        self.transport
            .send(&Frame::Error {
                error: ErrorPayload::new(code, message),
            })
            .await?;
        Ok(())
    }
}
