//! Token-budgeted conversation memory.
//!
//! Messages are append-only from the user-facing API. Each carries a
//! `ceil(len/4) + 10` token estimate; when the running total exceeds the
//! context window budget, older runs of consecutive tool calls/results
//! are folded into summary messages and, if that is not enough, the
//! oldest compacted messages are dropped. Compaction never reorders; the
//! most recent messages are never touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use tracing::debug;

/// Number of trailing messages never considered for compaction.
const KEEP_RECENT: usize = 5;

/// Runs of same-typed tool messages shorter than this stay verbatim.
const MIN_RUN_TO_COMPRESS: usize = 3;

/// Tool-result content is truncated to this many characters in the
/// in-memory message; metadata keeps the full value.
const RESULT_PREVIEW_CHARS: usize = 200;

/// Default maximum conversation tokens.
pub const DEFAULT_MAX_TOKENS: usize = 32_000;

/// Default share of `max_tokens` available to history.
pub const DEFAULT_WINDOW_RATIO: f64 = 0.8;

/// Role of a message in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// A user turn.
    User,
    /// An assistant turn.
    Assistant,
    /// System instructions.
    System,
    /// A tool invocation record.
    ToolCall,
    /// A tool result record.
    ToolResult,
}

/// A message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Message role.
    pub role: MessageRole,
    /// Message content.
    pub content: String,
    /// When the message was appended.
    pub timestamp: DateTime<Utc>,
    /// Side-band facts (tool names, parameters, success flags).
    pub metadata: Map<String, Value>,
    /// Estimated token count (`ceil(len/4) + 10`).
    pub estimated_tokens: usize,
}

/// A message in the shape expected by an LLM call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedMessage {
    /// API role (`user`, `assistant`, or `system`).
    pub role: String,
    /// Message content.
    pub content: String,
}

/// Bounded ordered conversation history.
#[derive(Debug)]
pub struct ConversationMemory {
    messages: Vec<ConversationMessage>,
    max_tokens: usize,
    context_window_tokens: usize,
    current_tokens: usize,
    compacted_dropped: usize,
}

impl ConversationMemory {
    /// Create a memory with the given budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(max_tokens: usize, window_ratio: f64) -> Self {
        let context_window_tokens = (max_tokens as f64 * window_ratio) as usize;
        Self {
            messages: Vec::new(),
            max_tokens,
            context_window_tokens,
            current_tokens: 0,
            compacted_dropped: 0,
        }
    }

    /// The token budget available to history.
    #[must_use]
    pub fn context_window_tokens(&self) -> usize {
        self.context_window_tokens
    }

    /// Current estimated token total.
    #[must_use]
    pub fn current_tokens(&self) -> usize {
        self.current_tokens
    }

    /// The configured maximum conversation tokens.
    #[must_use]
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Number of messages currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages dropped entirely by compaction so far.
    #[must_use]
    pub fn compacted_dropped(&self) -> usize {
        self.compacted_dropped
    }

    /// The current message list, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Append a user message.
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.add(content.into(), MessageRole::User, Map::new());
    }

    /// Append an assistant message.
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.add(content.into(), MessageRole::Assistant, Map::new());
    }

    /// Append a system message.
    pub fn add_system(&mut self, content: impl Into<String>) {
        self.add(content.into(), MessageRole::System, Map::new());
    }

    /// Append a tool-call record.
    pub fn add_tool_call(&mut self, tool_name: &str, parameters: &Map<String, Value>) {
        let mut metadata = Map::new();
        metadata.insert("tool_name".to_string(), json!(tool_name));
        metadata.insert("parameters".to_string(), Value::Object(parameters.clone()));
        self.add(format!("Tool call: {tool_name}"), MessageRole::ToolCall, metadata);
    }

    /// Append a tool-result record.
    ///
    /// The in-memory content keeps only the first 200 characters of the
    /// result; the full value lives in metadata.
    pub fn add_tool_result(&mut self, tool_name: &str, result: &str, success: bool) {
        let mut metadata = Map::new();
        metadata.insert("tool_name".to_string(), json!(tool_name));
        metadata.insert("success".to_string(), json!(success));
        metadata.insert("full_result".to_string(), json!(result));

        let outcome = if success { "Success" } else { "Error" };
        let mut content = format!("Tool result: {tool_name} - {outcome}\n");
        if result.chars().count() > RESULT_PREVIEW_CHARS {
            let preview: String = result.chars().take(RESULT_PREVIEW_CHARS).collect();
            content.push_str(&preview);
            content.push_str("...");
        } else {
            content.push_str(result);
        }

        self.add(content, MessageRole::ToolResult, metadata);
    }

    /// Drop everything (new session).
    pub fn clear(&mut self) {
        let cleared = self.messages.len();
        self.messages.clear();
        self.current_tokens = 0;
        self.compacted_dropped = 0;
        debug!(cleared, "conversation history cleared");
    }

    /// Export for an LLM call. Tool calls and results are emitted with
    /// `role=user`; system messages are included unless suppressed.
    #[must_use]
    pub fn export(&self, include_system: bool) -> Vec<ExportedMessage> {
        self.messages
            .iter()
            .filter(|m| include_system || m.role != MessageRole::System)
            .map(|m| ExportedMessage {
                role: match m.role {
                    MessageRole::User | MessageRole::ToolCall | MessageRole::ToolResult => {
                        "user".to_string()
                    },
                    MessageRole::Assistant => "assistant".to_string(),
                    MessageRole::System => "system".to_string(),
                },
                content: m.content.clone(),
            })
            .collect()
    }

    fn add(&mut self, content: String, role: MessageRole, metadata: Map<String, Value>) {
        let estimated_tokens = content.len().div_ceil(4) + 10;
        self.messages.push(ConversationMessage {
            role,
            content,
            timestamp: Utc::now(),
            metadata,
            estimated_tokens,
        });
        self.current_tokens += estimated_tokens;

        if self.current_tokens > self.context_window_tokens {
            self.compact();
        }
    }

    /// Fold older tool runs into summaries, then drop oldest compacted
    /// messages until the history fits the budget again.
    fn compact(&mut self) {
        if self.messages.len() <= KEEP_RECENT {
            return;
        }

        let split = self.messages.len() - KEEP_RECENT;
        let recent = self.messages.split_off(split);
        let older = std::mem::take(&mut self.messages);

        let mut compacted = compress_messages(older);

        let mut total: usize = compacted
            .iter()
            .chain(recent.iter())
            .map(|m| m.estimated_tokens)
            .sum();

        while total > self.context_window_tokens && !compacted.is_empty() {
            let removed = compacted.remove(0);
            total -= removed.estimated_tokens;
            self.compacted_dropped += 1;
        }

        self.messages = compacted;
        self.messages.extend(recent);
        self.current_tokens = total;

        debug!(
            messages = self.messages.len(),
            tokens = self.current_tokens,
            "context window compacted"
        );
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS, DEFAULT_WINDOW_RATIO)
    }
}

/// Coalesce consecutive runs of same-typed tool messages.
fn compress_messages(messages: Vec<ConversationMessage>) -> Vec<ConversationMessage> {
    let mut out: Vec<ConversationMessage> = Vec::with_capacity(messages.len());
    let mut run: Vec<ConversationMessage> = Vec::new();
    let mut run_role: Option<MessageRole> = None;

    for message in messages {
        let is_tool = matches!(message.role, MessageRole::ToolCall | MessageRole::ToolResult);
        if is_tool && run_role == Some(message.role) {
            run.push(message);
        } else {
            flush_run(&mut out, &mut run, run_role);
            if is_tool {
                run_role = Some(message.role);
                run.push(message);
            } else {
                run_role = None;
                out.push(message);
            }
        }
    }
    flush_run(&mut out, &mut run, run_role);
    out
}

fn flush_run(
    out: &mut Vec<ConversationMessage>,
    run: &mut Vec<ConversationMessage>,
    run_role: Option<MessageRole>,
) {
    if run.is_empty() {
        return;
    }
    let group = std::mem::take(run);
    if group.len() < MIN_RUN_TO_COMPRESS {
        out.extend(group);
        return;
    }
    match run_role {
        Some(MessageRole::ToolResult) => out.push(summarize_results(group)),
        Some(MessageRole::ToolCall) => out.push(summarize_calls(group)),
        _ => out.extend(group),
    }
}

fn tool_name_of(message: &ConversationMessage) -> String {
    message
        .metadata
        .get("tool_name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

fn summarize_results(group: Vec<ConversationMessage>) -> ConversationMessage {
    let names: BTreeSet<String> = group.iter().map(tool_name_of).collect();
    let successes = group
        .iter()
        .filter(|m| m.metadata.get("success").and_then(Value::as_bool).unwrap_or(true))
        .count();
    let errors = group.len() - successes;

    let mut content = format!("Tool execution summary: {} operations", group.len());
    if names.len() <= 3 {
        let joined: Vec<&str> = names.iter().map(String::as_str).collect();
        content.push_str(&format!(" ({})", joined.join(", ")));
    }
    content.push_str(&format!(" - {successes} successful, {errors} errors"));

    summary_message(content, MessageRole::ToolResult, &group)
}

fn summarize_calls(group: Vec<ConversationMessage>) -> ConversationMessage {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for message in &group {
        let name = tool_name_of(message);
        match counts.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name, 1)),
        }
    }

    let breakdown: Vec<String> = counts
        .iter()
        .map(|(name, count)| format!("{name}({count})"))
        .collect();
    let content = format!(
        "Tool calls summary: {} calls - {}",
        group.len(),
        breakdown.join(", ")
    );

    summary_message(content, MessageRole::ToolCall, &group)
}

fn summary_message(
    content: String,
    role: MessageRole,
    group: &[ConversationMessage],
) -> ConversationMessage {
    let timestamp = group.last().map_or_else(Utc::now, |m| m.timestamp);
    let mut metadata = Map::new();
    metadata.insert("compressed".to_string(), json!(true));
    metadata.insert("original_count".to_string(), json!(group.len()));
    let estimated_tokens = content.len().div_ceil(4) + 10;
    ConversationMessage {
        role,
        content,
        timestamp,
        metadata,
        estimated_tokens,
    }
}
