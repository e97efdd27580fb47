//! Shared harness: a real server and a real client joined by an
//! in-memory duplex channel, with a scripted provider supplying the
//! assistant turns.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

use gambiarra_client::approval::{ApprovalHandler, ApprovalRequest, ApprovalResponse};
use gambiarra_client::client::ClientUi;
use gambiarra_client::{ClientConfig, WorkspaceClient};
use gambiarra_core::ErrorCode;
use gambiarra_llm::ScriptedProvider;
use gambiarra_server::{Connection, Server, ServerConfig};

/// Records everything the client surfaces to its frontend.
#[derive(Default)]
pub struct RecordingUi {
    pub chunks: Mutex<Vec<String>>,
    pub statuses: Mutex<Vec<String>>,
    pub denials: Mutex<Vec<(String, String)>>,
    pub errors: Mutex<Vec<(ErrorCode, String)>>,
    pub command_lines: Mutex<Vec<String>>,
}

impl RecordingUi {
    pub fn denials(&self) -> Vec<(String, String)> {
        self.denials.lock().unwrap().clone()
    }

    pub fn full_transcript(&self) -> String {
        self.chunks.lock().unwrap().join("")
    }
}

impl ClientUi for RecordingUi {
    fn assistant_chunk(&self, text: &str) {
        self.chunks.lock().unwrap().push(text.to_string());
    }

    fn assistant_complete(&self) {}

    fn status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn tool_denied(&self, tool_name: &str, reason: &str) {
        self.denials
            .lock()
            .unwrap()
            .push((tool_name.to_string(), reason.to_string()));
    }

    fn server_error(&self, code: ErrorCode, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((code, message.to_string()));
    }

    fn command_output(&self, stream: &str, line: &str) {
        self.command_lines
            .lock()
            .unwrap()
            .push(format!("{stream}:{line}"));
    }
}

/// Approves everything that reaches the user, recording the requests.
#[derive(Default)]
pub struct RecordingApprover {
    pub requests: Mutex<Vec<ApprovalRequest>>,
}

impl RecordingApprover {
    pub fn descriptions(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.description.clone())
            .collect()
    }
}

#[async_trait]
impl ApprovalHandler for RecordingApprover {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResponse {
        self.requests.lock().unwrap().push(request.clone());
        ApprovalResponse::approved()
    }
}

pub struct Harness {
    pub client: WorkspaceClient<DuplexStream>,
    pub ui: Arc<RecordingUi>,
    pub approver: Arc<RecordingApprover>,
    pub server_task: JoinHandle<()>,
}

/// Spin up a connected server/client pair.
///
/// `responses` are the scripted assistant turns, in order. The client
/// auto-approves reads by default; pass `auto_approve_reads = false` to
/// force every request through the recording approver.
pub fn harness(
    workspace: &Path,
    responses: Vec<&str>,
    auto_approve_reads: bool,
) -> Harness {
    let (near, far) = tokio::io::duplex(1 << 20);

    let provider = ScriptedProvider::new(responses);
    let server = Server::new(ServerConfig::default(), Box::new(provider));
    let deps = server.deps();
    let server_task = tokio::spawn(async move {
        let _ = Connection::new(far, deps).serve().await;
    });

    let mut config = ClientConfig::new(workspace);
    config.auto_approve_reads = auto_approve_reads;
    // Keep test turns snappy
    config.turn_idle_grace_ms = 200;

    let ui = Arc::new(RecordingUi::default());
    let approver = Arc::new(RecordingApprover::default());
    let client = WorkspaceClient::new(
        near,
        config,
        Arc::clone(&approver) as Arc<dyn ApprovalHandler>,
        Arc::clone(&ui) as Arc<dyn ClientUi>,
    )
    .expect("client construction");

    Harness {
        client,
        ui,
        approver,
        server_task,
    }
}
