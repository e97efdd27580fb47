//! Client-side tool implementations.
//!
//! Tools receive already-unwrapped flat parameters and operate only on
//! sandbox-validated paths and commands. Every execution produces the
//! uniform [`ToolResult`] shape.

pub mod command_ops;
pub mod completion_ops;
pub mod file_ops;
pub mod search_ops;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use gambiarra_context::FileContextTracker;
use gambiarra_core::{ErrorCode, RiskLevel, ToolResult};
use gambiarra_protocol::unwrap_parameters;

use crate::sandbox::{CommandSandbox, PathSandbox, SecurityViolation};

/// Receives streamed command output lines as they arrive.
pub trait OutputSink: Send + Sync {
    /// One line of `stdout` or `stderr`.
    fn line(&self, stream: &str, content: &str);
}

/// A sink that drops all output.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn line(&self, _stream: &str, _content: &str) {}
}

/// Shared context available to all tools.
pub struct ToolContext {
    /// Path sandbox for the workspace.
    pub paths: Arc<PathSandbox>,
    /// Command sandbox.
    pub commands: Arc<CommandSandbox>,
    /// File-context tracker, shared with the approval pipeline.
    pub tracker: Arc<Mutex<FileContextTracker>>,
    /// Sink for streamed command output.
    pub output: Arc<dyn OutputSink>,
    /// Wall-clock timeout for command execution, seconds.
    pub command_timeout_secs: u64,
}

impl ToolContext {
    /// Validate a path through the sandbox, mapping violations to a
    /// `SECURITY_ERROR` result.
    ///
    /// # Errors
    ///
    /// Returns the error-shaped [`ToolResult`] to send back.
    pub fn validate_path(&self, raw: &str) -> Result<PathBuf, Box<ToolResult>> {
        self.paths.validate(raw).map_err(|violation| {
            Box::new(security_error(&violation))
        })
    }

    /// Record a read with the context tracker.
    pub fn track_read(&self, path: &std::path::Path, content: &str) {
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.on_read(path, content);
        }
    }

    /// Record a write with the context tracker.
    pub fn track_write(&self, path: &std::path::Path, content: &str) {
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.on_write(path, content);
        }
    }
}

fn security_error(violation: &SecurityViolation) -> ToolResult {
    let mut result = ToolResult::error(ErrorCode::SecurityError, violation.message.clone());
    if let Some(error) = result.error.as_mut() {
        error.details = violation.details.clone();
    }
    result
}

/// A client-side tool.
#[async_trait]
pub trait ClientTool: Send + Sync {
    /// Tool name, matching the registry.
    fn name(&self) -> &'static str;

    /// Default risk level.
    fn risk_level(&self) -> RiskLevel;

    /// Execute with flat parameters.
    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult;
}

/// Dispatches `execute_tool` frames to tool implementations.
pub struct ToolRunner {
    tools: HashMap<&'static str, Box<dyn ClientTool>>,
    ctx: ToolContext,
}

impl ToolRunner {
    /// Create a runner with the default tool set.
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        let mut runner = Self {
            tools: HashMap::new(),
            ctx,
        };
        runner.register(Box::new(file_ops::ReadFileTool));
        runner.register(Box::new(file_ops::WriteToFileTool));
        runner.register(Box::new(file_ops::InsertContentTool));
        runner.register(Box::new(file_ops::SearchAndReplaceTool));
        runner.register(Box::new(search_ops::SearchFilesTool));
        runner.register(Box::new(search_ops::ListFilesTool));
        runner.register(Box::new(search_ops::ListCodeDefinitionNamesTool));
        runner.register(Box::new(command_ops::ExecuteCommandTool));
        runner.register(Box::new(completion_ops::AttemptCompletionTool));
        runner.register(Box::new(completion_ops::AskFollowupQuestionTool));
        runner.register(Box::new(completion_ops::UpdateTodoListTool));
        runner
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Box<dyn ClientTool>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Names of all registered tools, sorted.
    #[must_use]
    pub fn tool_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Execute a tool from wire-shaped parameters.
    pub async fn execute_tool(&self, name: &str, parameters: &Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::error(ErrorCode::ToolNotFound, format!("Tool '{name}' not found"))
                .with_detail("available_tools", json!(self.tool_names()));
        };

        let flat = unwrap_parameters(name, parameters);
        info!(tool = name, "executing tool");
        let result = tool.execute(&flat, &self.ctx).await;
        if result.is_success() {
            info!(tool = name, "tool completed");
        } else {
            error!(
                tool = name,
                error = result.error_message().unwrap_or("unknown"),
                "tool failed"
            );
        }
        result
    }
}

/// Fetch a required string parameter.
pub(crate) fn require_str<'p>(
    params: &'p Map<String, Value>,
    key: &str,
) -> Result<&'p str, Box<ToolResult>> {
    params.get(key).and_then(Value::as_str).ok_or_else(|| {
        Box::new(ToolResult::error(
            ErrorCode::ToolExecutionError,
            format!("Missing required parameter: {key}"),
        ))
    })
}

/// Fetch an optional integer parameter that may arrive as a number or a
/// digit string.
pub(crate) fn integer_param(params: &Map<String, Value>, key: &str) -> Option<i64> {
    match params.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Fetch an optional boolean parameter that may arrive as a bool or a
/// `"true"`/`"false"` string.
pub(crate) fn bool_param(params: &Map<String, Value>, key: &str) -> Option<bool> {
    match params.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::Path;

    /// Build a tool context rooted at a temp workspace.
    pub(crate) fn context(root: &Path) -> ToolContext {
        ToolContext {
            paths: Arc::new(PathSandbox::new(root).unwrap()),
            commands: Arc::new(CommandSandbox::new()),
            tracker: Arc::new(Mutex::new(FileContextTracker::new())),
            output: Arc::new(NullSink),
            command_timeout_secs: 5,
        }
    }

    pub(crate) fn flat(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }
}
