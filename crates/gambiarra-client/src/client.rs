//! The workspace client connection loop.
//!
//! The client is fully reactive: it sends user turns, then processes
//! inbound frames - approval requests through the pipeline, executions
//! through the tool runner - until the server goes quiet after a
//! completed response.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use gambiarra_context::{ConversationMemory, FileContextTracker};
use gambiarra_core::{ErrorCode, SessionConfig, SessionId};
use gambiarra_protocol::{
    ClientInfo, Frame, FrameTransport, ToolInvocation, ToolSpec, unwrap_parameters,
};
use gambiarra_tools::ToolRegistry;

use crate::approval::{
    ApprovalHandler, ApprovalPipeline, ApprovalRequest, PipelineConfig, PolicyEngine,
};
use crate::config::{ClientConfig, PROTOCOL_VERSION};
use crate::error::{ClientError, ClientResult};
use crate::sandbox::{CommandSandbox, PathSandbox};
use crate::tools::{OutputSink, ToolContext, ToolRunner};

/// Renders client-visible events. Implemented by the console frontend and
/// by test doubles.
pub trait ClientUi: Send + Sync {
    /// A streamed piece of assistant text.
    fn assistant_chunk(&self, text: &str);

    /// The assistant turn finished streaming.
    fn assistant_complete(&self);

    /// A status line (connection, session).
    fn status(&self, message: &str);

    /// A tool was denied server-side.
    fn tool_denied(&self, tool_name: &str, reason: &str);

    /// An error frame arrived.
    fn server_error(&self, code: ErrorCode, message: &str);

    /// One line of streamed command output.
    fn command_output(&self, stream: &str, line: &str);
}

/// Adapter feeding command output into the UI.
struct UiSink(Arc<dyn ClientUi>);

impl OutputSink for UiSink {
    fn line(&self, stream: &str, content: &str) {
        self.0.command_output(stream, content);
    }
}

/// The workspace client.
pub struct WorkspaceClient<T> {
    transport: FrameTransport<T>,
    config: ClientConfig,
    session_id: Option<SessionId>,
    memory: ConversationMemory,
    pipeline: ApprovalPipeline,
    runner: ToolRunner,
    ui: Arc<dyn ClientUi>,
    response_buffer: String,
    turn_idle: bool,
}

impl<T: AsyncRead + AsyncWrite + Send> WorkspaceClient<T> {
    /// Build a client over an established duplex stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace root cannot be resolved.
    pub fn new(
        stream: T,
        config: ClientConfig,
        handler: Arc<dyn ApprovalHandler>,
        ui: Arc<dyn ClientUi>,
    ) -> ClientResult<Self> {
        let paths = Arc::new(
            PathSandbox::new(&config.workspace_root)
                .map_err(|e| ClientError::Workspace(e.to_string()))?,
        );
        let commands = Arc::new(CommandSandbox::new());
        let tracker = Arc::new(Mutex::new(FileContextTracker::new()));
        let registry = Arc::new(ToolRegistry::with_defaults());

        let policy = PolicyEngine::new(
            Arc::clone(&commands),
            config.auto_approve_reads,
            config.auto_approve_reads,
            config.auto_approve_reads,
        );
        let pipeline_config = PipelineConfig {
            auto_approve_low_risk: config.auto_approve_reads,
            auto_approve_reads: config.auto_approve_reads,
            auto_approve_lists: config.auto_approve_reads,
            repetition_limit: config.repetition_limit,
            ..PipelineConfig::default()
        };
        let pipeline = ApprovalPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
            handler,
            policy,
            pipeline_config,
        );

        let runner = ToolRunner::new(ToolContext {
            paths,
            commands,
            tracker,
            output: Arc::new(UiSink(Arc::clone(&ui))),
            command_timeout_secs: config.command_timeout_secs,
        });

        Ok(Self {
            transport: FrameTransport::new(stream),
            config,
            session_id: None,
            memory: ConversationMemory::default(),
            pipeline,
            runner,
            ui,
            response_buffer: String::new(),
            turn_idle: false,
        })
    }

    /// The active session id, once established.
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// The client-side conversation mirror.
    #[must_use]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Perform the handshake and open a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer in time.
    pub async fn connect_and_create_session(&mut self) -> ClientResult<()> {
        self.transport
            .send(&Frame::Connect {
                protocol_version: PROTOCOL_VERSION.to_string(),
                client_info: ClientInfo {
                    platform: "rust".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    capabilities: vec![
                        "file_operations".to_string(),
                        "command_execution".to_string(),
                    ],
                },
            })
            .await?;
        self.await_frame(|f| matches!(f, Frame::Connected { .. }), "connected")
            .await?;

        let session_config = SessionConfig {
            working_directory: self.config.workspace_root.clone(),
            auto_approve_reads: self.config.auto_approve_reads,
            require_approval_for_writes: true,
            max_concurrent_file_reads: 5,
            operating_mode: self.config.operating_mode,
        };
        self.transport
            .send(&Frame::CreateSession {
                config: session_config,
            })
            .await?;
        self.await_frame(
            |f| matches!(f, Frame::SessionCreated { .. }),
            "session_created",
        )
        .await?;

        Ok(())
    }

    /// Send a user turn.
    ///
    /// # Errors
    ///
    /// Returns an error if no session is active or the channel is closed.
    pub async fn send_user_message(&mut self, content: &str) -> ClientResult<()> {
        let session_id = self
            .session_id
            .clone()
            .ok_or(ClientError::NoActiveSession)?;
        self.memory.add_user(content);
        self.transport
            .send(&Frame::UserMessage {
                session_id,
                message: gambiarra_protocol::UserTurn {
                    content: content.to_string(),
                    images: Vec::new(),
                },
            })
            .await?;
        Ok(())
    }

    /// Process frames until the current turn is over: the server has
    /// completed a response and stayed quiet through the idle grace.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel closes mid-turn.
    pub async fn pump_turn(&mut self) -> ClientResult<()> {
        self.turn_idle = false;
        loop {
            let wait = if self.turn_idle {
                self.config.turn_idle_grace()
            } else {
                self.config.frame_read_timeout()
            };
            match tokio::time::timeout(wait, self.transport.recv()).await {
                Err(_elapsed) => {
                    if self.turn_idle {
                        return Ok(());
                    }
                    warn!("timed out waiting for server frame, still listening");
                },
                Ok(Ok(None)) => return Err(ClientError::ConnectionClosed),
                Ok(Ok(Some(frame))) => self.handle_frame(frame).await?,
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Handle one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a reply cannot be sent.
    #[allow(clippy::too_many_lines)]
    pub async fn handle_frame(&mut self, frame: Frame) -> ClientResult<()> {
        debug!(kind = frame.kind(), "handling frame");
        match frame {
            Frame::Connected { server_info } => {
                self.ui.status(&format!(
                    "Connected to server {} ({} tools available)",
                    server_info.version,
                    server_info.available_tools.len()
                ));
            },
            Frame::SessionCreated { session_id, status } => {
                info!(%session_id, %status, "session created");
                self.session_id = Some(session_id.clone());
                self.memory.clear();
                self.pipeline.reset_session_state();
                self.ui.status(&format!("Session created: {session_id}"));
            },
            Frame::AiResponseChunk { chunk, .. } => {
                if !chunk.content.is_empty() {
                    self.response_buffer.push_str(&chunk.content);
                    self.ui.assistant_chunk(&chunk.content);
                }
                if chunk.is_complete {
                    self.ui.assistant_complete();
                    if !self.response_buffer.trim().is_empty() {
                        let full = std::mem::take(&mut self.response_buffer);
                        self.memory.add_assistant(full);
                    }
                    self.response_buffer.clear();
                    self.turn_idle = true;
                }
            },
            Frame::ToolApprovalRequest {
                session_id,
                request_id,
                tool,
            } => {
                self.turn_idle = false;
                self.handle_approval_request(session_id, request_id, tool)
                    .await?;
            },
            Frame::ExecuteTool {
                session_id,
                execution_id,
                tool,
            } => {
                self.turn_idle = false;
                self.handle_execute_tool(session_id, execution_id, tool)
                    .await?;
            },
            Frame::ToolResultReceived { execution_id, .. } => {
                debug!(%execution_id, "server acknowledged tool result");
                self.turn_idle = false;
            },
            Frame::ToolDenied {
                tool_name, reason, ..
            } => {
                self.turn_idle = false;
                self.ui.tool_denied(&tool_name, &reason);
            },
            Frame::Error { error } => {
                self.ui.server_error(error.code, &error.message);
                // A provider failure terminates the turn server-side
                if error.code == ErrorCode::AiProcessingError {
                    self.turn_idle = true;
                }
            },
            other => {
                warn!(kind = other.kind(), "unexpected frame from server");
            },
        }
        Ok(())
    }

    async fn handle_approval_request(
        &mut self,
        session_id: SessionId,
        request_id: gambiarra_core::RequestId,
        tool: ToolSpec,
    ) -> ClientResult<()> {
        let request = ApprovalRequest {
            request_id: request_id.clone(),
            tool_name: tool.name.clone(),
            parameters: tool.parameters,
            description: tool.description,
            risk_level: tool.risk_level,
            requires_approval: tool.requires_approval,
            session_id: session_id.clone(),
            created_at: chrono::Utc::now(),
        };

        let response = self.pipeline.process(request).await;
        info!(tool = %tool.name, decision = ?response.decision, "approval decided");

        self.transport
            .send(&Frame::ToolApprovalResponse {
                session_id,
                request_id,
                decision: response.decision,
                feedback: response.feedback,
                modified_parameters: response.modified_parameters,
            })
            .await?;
        Ok(())
    }

    async fn handle_execute_tool(
        &mut self,
        session_id: SessionId,
        execution_id: gambiarra_core::ExecutionId,
        tool: ToolInvocation,
    ) -> ClientResult<()> {
        let flat = unwrap_parameters(&tool.name, &tool.parameters);
        self.memory.add_tool_call(&tool.name, &flat);

        let result = self.runner.execute_tool(&tool.name, &tool.parameters).await;

        self.pipeline.record_execution(&tool.name, &result);
        let rendered = result.data.as_ref().map_or_else(
            || {
                result
                    .error_message()
                    .unwrap_or("No result data")
                    .to_string()
            },
            render_data,
        );
        self.memory
            .add_tool_result(&tool.name, &rendered, result.is_success());

        self.transport
            .send(&Frame::ToolResult {
                session_id,
                execution_id,
                result,
            })
            .await?;
        Ok(())
    }

    async fn await_frame(
        &mut self,
        want: impl Fn(&Frame) -> bool,
        what: &str,
    ) -> ClientResult<()> {
        loop {
            let frame = tokio::time::timeout(
                self.config.frame_read_timeout(),
                self.transport.recv(),
            )
            .await
            .map_err(|_| {
                ClientError::HandshakeFailed(format!("timed out waiting for {what}"))
            })??
            .ok_or(ClientError::ConnectionClosed)?;

            let matched = want(&frame);
            self.handle_frame(frame).await?;
            if matched {
                return Ok(());
            }
        }
    }
}

fn render_data(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
