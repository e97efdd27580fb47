//! Workflow tools: completion signalling, follow-up questions, todo lists.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use gambiarra_core::{RiskLevel, ToolResult};

use crate::tools::{ClientTool, ToolContext, require_str};

/// Signal that the task is complete.
pub struct AttemptCompletionTool;

#[async_trait]
impl ClientTool for AttemptCompletionTool {
    fn name(&self) -> &'static str {
        "attempt_completion"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Minimal
    }

    async fn execute(&self, params: &Map<String, Value>, _ctx: &ToolContext) -> ToolResult {
        let result = match require_str(params, "result") {
            Ok(r) => r,
            Err(result) => return *result,
        };
        ToolResult::success(json!({ "result": result }))
            .with_metadata("operation", json!("completion_signaled"))
    }
}

/// Relay a clarifying question to the user.
pub struct AskFollowupQuestionTool;

#[async_trait]
impl ClientTool for AskFollowupQuestionTool {
    fn name(&self) -> &'static str {
        "ask_followup_question"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Minimal
    }

    async fn execute(&self, params: &Map<String, Value>, _ctx: &ToolContext) -> ToolResult {
        let question = match require_str(params, "question") {
            Ok(q) => q,
            Err(result) => return *result,
        };
        ToolResult::success(json!({ "question": question }))
            .with_metadata("operation", json!("question_asked"))
    }
}

/// Accept a markdown todo list and acknowledge it.
pub struct UpdateTodoListTool;

#[async_trait]
impl ClientTool for UpdateTodoListTool {
    fn name(&self) -> &'static str {
        "update_todo_list"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }

    async fn execute(&self, params: &Map<String, Value>, _ctx: &ToolContext) -> ToolResult {
        let todos = match require_str(params, "todos") {
            Ok(t) => t,
            Err(result) => return *result,
        };

        let total = todos
            .lines()
            .filter(|line| line.trim_start().starts_with("- ["))
            .count();
        let done = todos
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                trimmed.starts_with("- [x]") || trimmed.starts_with("- [X]")
            })
            .count();

        ToolResult::success(json!({ "todos": todos }))
            .with_metadata("operation", json!("todo_list_updated"))
            .with_metadata("item_count", json!(total))
            .with_metadata("completed_count", json!(done))
    }
}
