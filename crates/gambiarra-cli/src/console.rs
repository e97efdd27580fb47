//! Console frontend: prompt input, approval dialogs, and output rendering.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use gambiarra_client::approval::{ApprovalHandler, ApprovalRequest, ApprovalResponse};
use gambiarra_client::client::ClientUi;
use gambiarra_core::ErrorCode;

/// Shared line reader over stdin.
///
/// Both the prompt loop and the approval handler read from here, so a
/// single buffered reader avoids the two swallowing each other's input.
pub struct ConsoleInput {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleInput {
    /// Wrap stdin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Print a prompt and read one line. `None` on EOF.
    pub async fn prompt(&self, prompt: &str) -> Option<String> {
        use std::io::Write;
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        self.lines.lock().await.next_line().await.ok().flatten()
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Console renderer for client events.
pub struct ConsoleUi;

impl ClientUi for ConsoleUi {
    fn assistant_chunk(&self, text: &str) {
        use std::io::Write;
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn assistant_complete(&self) {
        println!();
    }

    fn status(&self, message: &str) {
        println!("{message}");
    }

    fn tool_denied(&self, tool_name: &str, reason: &str) {
        println!("\u{1f6ab} Tool denied: {tool_name} \u{2014} {reason}");
    }

    fn server_error(&self, code: ErrorCode, message: &str) {
        eprintln!("server error [{code}]: {message}");
    }

    fn command_output(&self, stream: &str, line: &str) {
        println!("[{}] {line}", stream.to_uppercase());
    }
}

/// Console approval dialog.
pub struct ConsoleApprovalHandler {
    input: Arc<ConsoleInput>,
}

impl ConsoleApprovalHandler {
    /// Create a handler reading decisions from the shared console input.
    #[must_use]
    pub fn new(input: Arc<ConsoleInput>) -> Self {
        Self { input }
    }
}

#[async_trait]
impl ApprovalHandler for ConsoleApprovalHandler {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResponse {
        println!("\n\u{1f510} APPROVAL REQUEST");
        println!("Tool: {}", request.tool_name);
        println!("Risk level: {}", request.risk_level);
        println!("Description: {}", request.description);
        println!(
            "Parameters: {}",
            serde_json::to_string_pretty(&request.parameters).unwrap_or_default()
        );

        loop {
            let Some(choice) = self.input.prompt("Approve? (y/n): ").await else {
                // EOF on stdin: deny for safety
                return ApprovalResponse::denied("No approval input available");
            };
            match choice.trim().to_lowercase().as_str() {
                "y" | "yes" => return ApprovalResponse::approved(),
                "n" | "no" => {
                    let feedback = self
                        .input
                        .prompt("Reason for denial (optional): ")
                        .await
                        .unwrap_or_default();
                    let feedback = feedback.trim();
                    return if feedback.is_empty() {
                        ApprovalResponse::denied("Tool execution denied by user")
                    } else {
                        ApprovalResponse::denied(feedback)
                    };
                },
                _ => println!("Please answer y or n."),
            }
        }
    }
}
