//! Tool-result summarisation for conversation memory.
//!
//! After a successful `tool_result` the server re-injects a short
//! assistant-role message whose first line begins `Tool result:`. The
//! shape depends on the tool. These summaries double as the safety-budget
//! counter, so the prefix is load-bearing.

use serde_json::Value;

use gambiarra_core::ToolResult;

/// Characters of file content echoed back for `read_file`.
const READ_PREVIEW_CHARS: usize = 200;

/// Characters of stdout echoed back for `execute_command`.
const OUTPUT_PREVIEW_CHARS: usize = 300;

/// Characters of generic data echoed back for other tools.
const GENERIC_PREVIEW_CHARS: usize = 100;

/// Render a tool result as the message fed back to the model.
#[must_use]
pub fn summarize_tool_result(tool_name: &str, result: &ToolResult) -> String {
    if !result.is_success() {
        return format!(
            "Tool failed: {}",
            result.error_message().unwrap_or("Unknown error")
        );
    }

    match tool_name {
        "list_files" => summarize_listing(result),
        "write_to_file" => summarize_write(result),
        "read_file" => summarize_read(result),
        "execute_command" => summarize_command(result),
        _ => summarize_generic(result),
    }
}

/// The message appended when a tool call is denied.
#[must_use]
pub fn denial_message(tool_name: &str, reason: &str) -> String {
    format!(
        "Tool result: The '{tool_name}' tool was denied by the user. Reason: {reason}. \
         Please acknowledge this and consider alternative approaches."
    )
}

fn summarize_listing(result: &ToolResult) -> String {
    let empty = Vec::new();
    let files = result
        .data
        .as_ref()
        .and_then(|d| d.get("files"))
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let directories = result
        .data
        .as_ref()
        .and_then(|d| d.get("directories"))
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    if files.is_empty() && directories.is_empty() {
        return "No files or directories found in the workspace.".to_string();
    }

    let mut parts = Vec::new();
    if !directories.is_empty() {
        let names: Vec<&str> = directories
            .iter()
            .map(|d| d.get("name").and_then(Value::as_str).unwrap_or("unknown"))
            .collect();
        parts.push(format!("Directories: {}", names.join(", ")));
    }
    if !files.is_empty() {
        let entries: Vec<String> = files
            .iter()
            .map(|f| {
                let name = f.get("name").and_then(Value::as_str).unwrap_or("unknown");
                let size = f.get("size").and_then(Value::as_u64).unwrap_or(0);
                format!("{name} ({size} bytes)")
            })
            .collect();
        parts.push(format!("Files: {}", entries.join(", ")));
    }

    format!("Tool result: {}", parts.join("; "))
}

fn summarize_write(result: &ToolResult) -> String {
    let path = result
        .metadata
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let bytes = result
        .metadata
        .get("bytes_written")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let verb = match result.metadata.get("operation").and_then(Value::as_str) {
        Some("file_updated") => "Updated",
        _ => "Created",
    };
    format!("Tool result: {verb} file {path} ({bytes} bytes)")
}

fn summarize_read(result: &ToolResult) -> String {
    let path = result
        .metadata
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or("unknown file");
    let content = result.data.as_ref().and_then(Value::as_str).unwrap_or("");
    let preview: String = content.chars().take(READ_PREVIEW_CHARS).collect();
    format!(
        "Tool result: Read {path} ({} chars). Content: {preview}...",
        content.chars().count()
    )
}

fn summarize_command(result: &ToolResult) -> String {
    let command = result
        .metadata
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or("unknown command");
    let stdout = result
        .data
        .as_ref()
        .and_then(|d| d.get("stdout"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let preview: String = stdout.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    format!("Tool result: Executed '{command}'. Output: {preview}")
}

fn summarize_generic(result: &ToolResult) -> String {
    let rendered = result
        .data
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    let preview: String = rendered.chars().take(GENERIC_PREVIEW_CHARS).collect();
    format!("Tool result: Operation completed successfully. Data: {preview}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambiarra_core::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_failed_result() {
        let result = ToolResult::error(ErrorCode::FileNotFound, "File 'x' does not exist");
        assert_eq!(
            summarize_tool_result("read_file", &result),
            "Tool failed: File 'x' does not exist"
        );
    }

    #[test]
    fn test_read_summary() {
        let result = ToolResult::success(json!("# Hello\n"))
            .with_metadata("path", json!("README.md"));
        assert_eq!(
            summarize_tool_result("read_file", &result),
            "Tool result: Read README.md (8 chars). Content: # Hello\n..."
        );
    }

    #[test]
    fn test_listing_summary() {
        let result = ToolResult::success(json!({
            "directories": [{"name": "src"}, {"name": "tests"}],
            "files": [{"name": "Cargo.toml", "size": 210}],
        }));
        assert_eq!(
            summarize_tool_result("list_files", &result),
            "Tool result: Directories: src, tests; Files: Cargo.toml (210 bytes)"
        );
    }

    #[test]
    fn test_empty_listing() {
        let result = ToolResult::success(json!({"files": [], "directories": []}));
        assert_eq!(
            summarize_tool_result("list_files", &result),
            "No files or directories found in the workspace."
        );
    }

    #[test]
    fn test_write_summary() {
        let created = ToolResult::success_empty()
            .with_metadata("operation", json!("file_created"))
            .with_metadata("path", json!("a.txt"))
            .with_metadata("bytes_written", json!(12));
        assert_eq!(
            summarize_tool_result("write_to_file", &created),
            "Tool result: Created file a.txt (12 bytes)"
        );

        let updated = ToolResult::success_empty()
            .with_metadata("operation", json!("file_updated"))
            .with_metadata("path", json!("a.txt"))
            .with_metadata("bytes_written", json!(3));
        assert_eq!(
            summarize_tool_result("write_to_file", &updated),
            "Tool result: Updated file a.txt (3 bytes)"
        );
    }

    #[test]
    fn test_command_summary() {
        let result = ToolResult::success(json!({"stdout": "ok\n", "stderr": "", "exit_code": 0}))
            .with_metadata("command", json!("echo ok"));
        assert_eq!(
            summarize_tool_result("execute_command", &result),
            "Tool result: Executed 'echo ok'. Output: ok\n"
        );
    }

    #[test]
    fn test_generic_summary_truncates() {
        let result = ToolResult::success(json!({"payload": "x".repeat(500)}));
        let summary = summarize_tool_result("update_todo_list", &result);
        assert!(summary.starts_with("Tool result: Operation completed successfully. Data: "));
        assert!(summary.len() < 200);
    }

    #[test]
    fn test_denial_message_shape() {
        let message = denial_message("write_to_file", "not today");
        assert!(message.starts_with("Tool result: The 'write_to_file' tool was denied"));
        assert!(message.contains("Reason: not today."));
        assert!(message.contains("consider alternative approaches"));
    }
}
