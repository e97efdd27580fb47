//! Mode-based tool filtering.
//!
//! Each operating mode maps to an allowed tool set, per-tool parameter
//! restrictions, and optional downward risk revisions. A tool call that
//! fails any of these is short-circuited as denied without ever reaching
//! the user or the executor.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use gambiarra_core::{OperatingMode, RiskLevel};

/// Verdict of the mode filter for one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeVerdict {
    /// The call may proceed, possibly with a revised risk level.
    Allowed {
        /// Risk level after mode revision, if the mode revises it.
        modified_risk: Option<RiskLevel>,
    },
    /// The call is denied before approval.
    Blocked {
        /// Why the call was blocked.
        reason: String,
    },
}

const READ_TOOLS: &[&str] = &[
    "read_file",
    "list_files",
    "search_files",
    "list_code_definition_names",
];
const WRITE_TOOLS: &[&str] = &["write_to_file", "search_and_replace", "insert_content"];
const COMMAND_TOOLS: &[&str] = &["execute_command"];
const COMMUNICATION_TOOLS: &[&str] = &["attempt_completion", "ask_followup_question"];
const TASK_TOOLS: &[&str] = &["update_todo_list"];

/// Source-file extensions readable in architect mode.
const ARCHITECT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".java", ".go", ".rs", ".md", ".json", ".yaml", ".yml",
];

/// Command programs runnable in debug mode.
const DEBUG_COMMANDS: &[&str] = &[
    "ls", "cat", "grep", "find", "ps", "top", "df", "free", "uname",
];

/// Maximum `search_files` results in ask mode.
const ASK_MAX_RESULTS: u64 = 20;

/// Maximum `list_files` depth in architect mode.
const ARCHITECT_MAX_DEPTH: u64 = 3;

/// Per-session policy object restricting which tools the model may invoke
/// and with what parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModeFilter;

impl ModeFilter {
    /// Create the filter. The tables are fixed; the filter is stateless
    /// and freely shareable.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The set of tool names allowed in a mode.
    #[must_use]
    pub fn allowed_tools(&self, mode: OperatingMode) -> BTreeSet<&'static str> {
        let categories: &[&[&str]] = match mode {
            OperatingMode::Code => &[
                READ_TOOLS,
                WRITE_TOOLS,
                COMMAND_TOOLS,
                COMMUNICATION_TOOLS,
                TASK_TOOLS,
            ],
            OperatingMode::Ask | OperatingMode::Architect | OperatingMode::Review => {
                &[READ_TOOLS, COMMUNICATION_TOOLS]
            },
            OperatingMode::Debug => &[READ_TOOLS, COMMAND_TOOLS, COMMUNICATION_TOOLS],
        };
        categories.iter().flat_map(|c| c.iter().copied()).collect()
    }

    /// Check whether a tool is allowed at all in a mode.
    #[must_use]
    pub fn is_tool_allowed(&self, tool_name: &str, mode: OperatingMode) -> bool {
        self.allowed_tools(mode).contains(tool_name)
    }

    /// Risk level after mode revision, if the mode revises this tool.
    #[must_use]
    pub fn modified_risk(&self, tool_name: &str, mode: OperatingMode) -> Option<RiskLevel> {
        match (mode, tool_name) {
            (OperatingMode::Ask, "read_file" | "list_files") => Some(RiskLevel::Minimal),
            (OperatingMode::Ask, "search_files") => Some(RiskLevel::Low),
            (
                OperatingMode::Architect | OperatingMode::Review,
                "read_file" | "list_files" | "search_files" | "list_code_definition_names",
            ) => Some(RiskLevel::Minimal),
            (OperatingMode::Debug, "read_file" | "search_files") => Some(RiskLevel::Low),
            (OperatingMode::Debug, "execute_command") => Some(RiskLevel::High),
            _ => None,
        }
    }

    /// Filter one tool call for a mode.
    #[must_use]
    pub fn evaluate(
        &self,
        tool_name: &str,
        parameters: &Map<String, Value>,
        mode: OperatingMode,
    ) -> ModeVerdict {
        if !self.is_tool_allowed(tool_name, mode) {
            return ModeVerdict::Blocked {
                reason: format!("Tool '{tool_name}' is not available in {mode} mode"),
            };
        }

        if let Some(violation) = self.check_restrictions(tool_name, parameters, mode) {
            return ModeVerdict::Blocked {
                reason: format!("Parameter restriction violated in {mode} mode: {violation}"),
            };
        }

        ModeVerdict::Allowed {
            modified_risk: self.modified_risk(tool_name, mode),
        }
    }

    /// Per-tool parameter restrictions. Returns a violation description or
    /// `None`.
    fn check_restrictions(
        &self,
        tool_name: &str,
        parameters: &Map<String, Value>,
        mode: OperatingMode,
    ) -> Option<String> {
        match (mode, tool_name) {
            (OperatingMode::Ask, "search_files") => {
                let limit = parameters.get("limit").and_then(Value::as_u64)?;
                (limit > ASK_MAX_RESULTS).then(|| {
                    format!("Result limit {limit} exceeds mode maximum {ASK_MAX_RESULTS}")
                })
            },
            (OperatingMode::Architect, "read_file") => {
                let path = parameters.get("path").and_then(Value::as_str)?;
                let allowed = ARCHITECT_EXTENSIONS.iter().any(|ext| path.ends_with(ext));
                (!allowed).then(|| "File extension not allowed in this mode".to_string())
            },
            (OperatingMode::Architect, "list_files") => {
                let recursive = parameters
                    .get("recursive")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let depth = parameters.get("depth").and_then(Value::as_u64)?;
                (recursive && depth > ARCHITECT_MAX_DEPTH).then(|| {
                    format!("Directory depth {depth} exceeds mode maximum {ARCHITECT_MAX_DEPTH}")
                })
            },
            (OperatingMode::Debug, "execute_command") => {
                let command = parameters.get("command").and_then(Value::as_str)?;
                let program = command.split_whitespace().next().unwrap_or("");
                let allowed = DEBUG_COMMANDS.contains(&program);
                (!allowed).then(|| format!("Command '{program}' not allowed in this mode"))
            },
            _ => None,
        }
    }
}
