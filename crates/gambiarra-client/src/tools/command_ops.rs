//! Command execution with streamed output.
//!
//! Argv is derived by POSIX shell-word splitting; no shell is ever
//! invoked. The child gets a minimal environment and a hard wall-clock
//! timeout.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use gambiarra_core::{ErrorCode, RiskLevel, ToolResult};

use crate::tools::{ClientTool, OutputSink, ToolContext, integer_param, require_str};

/// Environment variables always forwarded when present.
const BASE_ENV: &[&str] = &["PATH", "HOME", "USER", "SHELL", "TERM", "LANG"];

/// Development-tool variables forwarded when present.
const DEV_ENV: &[&str] = &["PYTHON_PATH", "NODE_PATH", "JAVA_HOME", "CARGO_HOME"];

/// Execute a shell command with security controls.
pub struct ExecuteCommandTool;

#[async_trait]
impl ClientTool for ExecuteCommandTool {
    fn name(&self) -> &'static str {
        "execute_command"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::High
    }

    #[allow(clippy::too_many_lines)]
    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let command = match require_str(params, "command") {
            Ok(c) => c,
            Err(result) => return *result,
        };
        let cwd = params.get("cwd").and_then(Value::as_str).unwrap_or(".");
        #[allow(clippy::cast_sign_loss)]
        let timeout_secs = integer_param(params, "timeout")
            .filter(|t| *t > 0)
            .map_or(ctx.command_timeout_secs, |t| t as u64);

        // Defense in depth: the approval pipeline already consulted the
        // command sandbox, but execution never trusts that it did.
        if let Err(rule) = ctx.commands.check(command) {
            return ToolResult::error(
                ErrorCode::SecurityError,
                format!("Command blocked by security policy: {rule}"),
            )
            .with_detail("command", json!(command));
        }

        let work_dir = match ctx.validate_path(cwd) {
            Ok(p) => p,
            Err(result) => return *result,
        };
        if !work_dir.exists() {
            return ToolResult::error(
                ErrorCode::DirectoryNotFound,
                format!("Working directory '{cwd}' does not exist"),
            );
        }

        let Some(argv) = shlex::split(command) else {
            return ToolResult::error(
                ErrorCode::CommandError,
                "Command could not be parsed into arguments",
            )
            .with_detail("command", json!(command));
        };
        let Some((program, args)) = argv.split_first() else {
            return ToolResult::error(ErrorCode::CommandError, "Empty command");
        };

        let mut child = match Command::new(program)
            .args(args)
            .current_dir(&work_dir)
            .env_clear()
            .envs(safe_environment())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ToolResult::error(
                    ErrorCode::CommandError,
                    format!("Command not found: {program}"),
                );
            },
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return ToolResult::error(
                    ErrorCode::PermissionDenied,
                    format!("Permission denied executing command: {command}"),
                );
            },
            Err(e) => {
                return ToolResult::error(ErrorCode::CommandError, e.to_string())
                    .with_detail("command", json!(command));
            },
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let started = Instant::now();

        let run = async {
            let out = drain_lines(stdout, "stdout", ctx.output.as_ref());
            let err = drain_lines(stderr, "stderr", ctx.output.as_ref());
            let (out, err, status) = tokio::join!(out, err, child.wait());
            (out, err, status)
        };

        let (stdout_text, stderr_text, status) =
            match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
                Ok(done) => done,
                Err(_) => {
                    let _ = child.kill().await;
                    return ToolResult::error(
                        ErrorCode::CommandTimeout,
                        format!("Command timed out after {timeout_secs} seconds"),
                    )
                    .with_detail("command", json!(command))
                    .with_detail("timeout", json!(timeout_secs));
                },
            };

        let exit_code = match status {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                return ToolResult::error(ErrorCode::CommandError, e.to_string())
                    .with_detail("command", json!(command));
            },
        };

        let elapsed = started.elapsed().as_secs_f64();
        ToolResult::success(json!({
            "stdout": stdout_text,
            "stderr": stderr_text,
            "exit_code": exit_code,
            "execution_time": (elapsed * 100.0).round() / 100.0,
        }))
        .with_metadata("command", json!(command))
        .with_metadata("cwd", json!(work_dir.display().to_string()))
        .with_metadata("timeout", json!(timeout_secs))
    }
}

/// Read a child stream line by line, forwarding each line to the sink.
async fn drain_lines<R>(reader: Option<R>, stream_name: &str, sink: &dyn OutputSink) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        sink.line(stream_name, &line);
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

/// Minimal environment for child processes.
fn safe_environment() -> Vec<(String, String)> {
    let mut env = Vec::new();
    for key in BASE_ENV {
        if let Ok(value) = std::env::var(key) {
            env.push(((*key).to_string(), value));
        }
    }
    for key in DEV_ENV {
        if let Ok(value) = std::env::var(key) {
            env.push(((*key).to_string(), value));
        }
    }
    env
}
