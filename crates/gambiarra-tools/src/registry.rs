//! The closed tool set.

use std::collections::HashMap;

use gambiarra_core::RiskLevel;

/// Parameter value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Non-empty UTF-8 string.
    String,
    /// Non-negative integer.
    Integer,
    /// `true` / `false`.
    Boolean,
}

/// One parameter in a tool's schema.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Parameter name as it appears in XML and on the wire.
    pub name: &'static str,
    /// Value kind.
    pub kind: ParamKind,
    /// Whether the parameter must be present.
    pub required: bool,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Definition of a tool and its capabilities.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: &'static str,
    /// Human-readable description for prompts and approval dialogs.
    pub description: &'static str,
    /// Parameter schema.
    pub parameters: &'static [ParamSpec],
    /// Default risk level.
    pub risk_level: RiskLevel,
    /// Whether the tool requires approval by default.
    pub requires_approval: bool,
}

/// Registry of available tools.
///
/// Initialised once per process and shared read-only afterwards.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a registry with the default tool set.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut tools = HashMap::new();
        for tool in default_tools() {
            tools.insert(tool.name, tool);
        }
        Self { tools }
    }

    /// Get a tool definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Check if a tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    /// Risk level for a tool; unknown tools default to medium.
    #[must_use]
    pub fn risk_level(&self, name: &str) -> RiskLevel {
        self.get(name).map_or(RiskLevel::Medium, |t| t.risk_level)
    }

    /// Whether a tool requires approval; unknown tools default to yes.
    #[must_use]
    pub fn requires_approval(&self, name: &str) -> bool {
        self.get(name).is_none_or(|t| t.requires_approval)
    }

    /// Iterate over all definitions in name order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        let mut defs: Vec<&ToolDefinition> = self.tools.values().collect();
        defs.sort_by_key(|d| d.name);
        defs.into_iter()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

const READ_FILE_PARAMS: &[ParamSpec] = &[ParamSpec::required("path", ParamKind::String)];

const WRITE_TO_FILE_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("path", ParamKind::String),
    ParamSpec::required("content", ParamKind::String),
    ParamSpec::required("line_count", ParamKind::Integer),
];

const LIST_FILES_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("path", ParamKind::String),
    ParamSpec::optional("recursive", ParamKind::Boolean),
];

const SEARCH_FILES_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("path", ParamKind::String),
    ParamSpec::required("regex", ParamKind::String),
    ParamSpec::optional("file_pattern", ParamKind::String),
];

const EXECUTE_COMMAND_PARAMS: &[ParamSpec] = &[ParamSpec::required("command", ParamKind::String)];

const SEARCH_AND_REPLACE_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("path", ParamKind::String),
    ParamSpec::required("search", ParamKind::String),
    ParamSpec::required("replace", ParamKind::String),
];

const INSERT_CONTENT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("path", ParamKind::String),
    ParamSpec::required("line_number", ParamKind::Integer),
    ParamSpec::required("content", ParamKind::String),
];

const LIST_CODE_DEFINITION_NAMES_PARAMS: &[ParamSpec] =
    &[ParamSpec::required("path", ParamKind::String)];

const ATTEMPT_COMPLETION_PARAMS: &[ParamSpec] = &[ParamSpec::required("result", ParamKind::String)];

const ASK_FOLLOWUP_QUESTION_PARAMS: &[ParamSpec] =
    &[ParamSpec::required("question", ParamKind::String)];

const UPDATE_TODO_LIST_PARAMS: &[ParamSpec] = &[ParamSpec::required("todos", ParamKind::String)];

fn default_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "read_file",
            description: "Read and view the contents of a file",
            parameters: READ_FILE_PARAMS,
            risk_level: RiskLevel::Low,
            requires_approval: false,
        },
        ToolDefinition {
            name: "write_to_file",
            description: "Write content to a file",
            parameters: WRITE_TO_FILE_PARAMS,
            risk_level: RiskLevel::High,
            requires_approval: true,
        },
        ToolDefinition {
            name: "list_files",
            description: "List files and directories in a directory",
            parameters: LIST_FILES_PARAMS,
            risk_level: RiskLevel::Low,
            requires_approval: false,
        },
        ToolDefinition {
            name: "search_files",
            description: "Search for text patterns within files using regex",
            parameters: SEARCH_FILES_PARAMS,
            risk_level: RiskLevel::Low,
            requires_approval: false,
        },
        ToolDefinition {
            name: "execute_command",
            description: "Execute a command in the terminal",
            parameters: EXECUTE_COMMAND_PARAMS,
            risk_level: RiskLevel::High,
            requires_approval: true,
        },
        ToolDefinition {
            name: "search_and_replace",
            description: "Find and replace text in a file",
            parameters: SEARCH_AND_REPLACE_PARAMS,
            risk_level: RiskLevel::Medium,
            requires_approval: true,
        },
        ToolDefinition {
            name: "insert_content",
            description: "Insert content at a specific line in a file",
            parameters: INSERT_CONTENT_PARAMS,
            risk_level: RiskLevel::Medium,
            requires_approval: true,
        },
        ToolDefinition {
            name: "list_code_definition_names",
            description: "Get an overview of code definitions in a source file",
            parameters: LIST_CODE_DEFINITION_NAMES_PARAMS,
            risk_level: RiskLevel::Low,
            requires_approval: false,
        },
        ToolDefinition {
            name: "attempt_completion",
            description: "Signal that a task has been completed",
            parameters: ATTEMPT_COMPLETION_PARAMS,
            risk_level: RiskLevel::Minimal,
            requires_approval: false,
        },
        ToolDefinition {
            name: "ask_followup_question",
            description: "Ask the user a follow-up question for clarification",
            parameters: ASK_FOLLOWUP_QUESTION_PARAMS,
            risk_level: RiskLevel::Minimal,
            requires_approval: false,
        },
        ToolDefinition {
            name: "update_todo_list",
            description: "Create or update a todo list to track progress",
            parameters: UPDATE_TODO_LIST_PARAMS,
            risk_level: RiskLevel::Low,
            requires_approval: false,
        },
    ]
}
