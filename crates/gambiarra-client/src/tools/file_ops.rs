//! File operation tools: read, write, insert, search-and-replace.
//!
//! Write operations copy the existing target to `<path>.backup` before
//! touching it and report to the file-context tracker.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::Path;

use gambiarra_core::{ErrorCode, RiskLevel, ToolResult};

use crate::tools::{ClientTool, ToolContext, integer_param, require_str};

/// Read file contents with an optional line range.
pub struct ReadFileTool;

#[async_trait]
impl ClientTool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let path = match require_str(params, "path") {
            Ok(p) => p,
            Err(result) => return *result,
        };
        let validated = match ctx.validate_path(path) {
            Ok(p) => p,
            Err(result) => return *result,
        };

        if !validated.exists() {
            return ToolResult::error(
                ErrorCode::FileNotFound,
                format!("File '{path}' does not exist"),
            )
            .with_detail("attempted_path", json!(path));
        }

        let content = match tokio::fs::read(&validated).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    return ToolResult::error(
                        ErrorCode::EncodingError,
                        "File contains non-UTF-8 content",
                    )
                    .with_detail("path", json!(path));
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return ToolResult::error(
                    ErrorCode::PermissionDenied,
                    format!("Permission denied reading file '{path}'"),
                );
            },
            Err(e) => {
                return ToolResult::error(ErrorCode::ToolExecutionError, e.to_string())
                    .with_detail("path", json!(path));
            },
        };

        let lines: Vec<&str> = content.split('\n').collect();
        let actual_line_count = effective_line_count(&content, lines.len());

        let (result_content, read_lines) = match line_range(params) {
            Err(result) => return *result,
            Ok(None) => (content.clone(), "all".to_string()),
            Ok(Some((start, end))) => {
                if start < 1 {
                    return ToolResult::error(
                        ErrorCode::InvalidLineRange,
                        format!("start_line must be >= 1, got {start}"),
                    )
                    .with_detail("total_lines", json!(actual_line_count));
                }
                if end < start || start > actual_line_count as i64 {
                    return ToolResult::error(
                        ErrorCode::InvalidLineRange,
                        format!("Invalid line range: {start}-{end}"),
                    )
                    .with_detail("total_lines", json!(actual_line_count));
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let slice =
                    &lines[(start - 1) as usize..(end as usize).min(lines.len())];
                (slice.join("\n"), format!("{start}-{end}"))
            },
        };

        ctx.track_read(&validated, &result_content);

        ToolResult::success(json!(result_content))
            .with_metadata("path", json!(path))
            .with_metadata("file_size", json!(content.len()))
            .with_metadata("line_count", json!(actual_line_count))
            .with_metadata("read_lines", json!(read_lines))
            .with_metadata("encoding", json!("utf-8"))
    }
}

/// Write content to a file, creating parents and a backup.
pub struct WriteToFileTool;

#[async_trait]
impl ClientTool for WriteToFileTool {
    fn name(&self) -> &'static str {
        "write_to_file"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::High
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let path = match require_str(params, "path") {
            Ok(p) => p,
            Err(result) => return *result,
        };
        let content = match require_str(params, "content") {
            Ok(c) => c.to_string(),
            Err(result) => return *result,
        };
        let validated = match ctx.validate_path(path) {
            Ok(p) => p,
            Err(result) => return *result,
        };

        let backup_created = match create_backup(&validated).await {
            Ok(created) => created,
            Err(result) => return *result,
        };

        if let Some(parent) = validated.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::error(ErrorCode::ToolExecutionError, e.to_string())
                    .with_detail("path", json!(path));
            }
        }

        if let Err(e) = tokio::fs::write(&validated, &content).await {
            let code = if e.kind() == std::io::ErrorKind::PermissionDenied {
                ErrorCode::PermissionDenied
            } else {
                ErrorCode::ToolExecutionError
            };
            return ToolResult::error(code, format!("Failed writing to '{path}': {e}"));
        }

        let actual_line_count = written_line_count(&content);
        if let Some(expected) = integer_param(params, "line_count") {
            if expected != actual_line_count as i64 {
                return ToolResult::error(
                    ErrorCode::LineCountMismatch,
                    format!("Expected {expected} lines, got {actual_line_count}"),
                )
                .with_detail("expected", json!(expected))
                .with_detail("actual", json!(actual_line_count));
            }
        }

        ctx.track_write(&validated, &content);

        let operation = if backup_created {
            "file_updated"
        } else {
            "file_created"
        };
        ToolResult::success_empty()
            .with_metadata("operation", json!(operation))
            .with_metadata("path", json!(path))
            .with_metadata("bytes_written", json!(content.len()))
            .with_metadata("line_count", json!(actual_line_count))
            .with_metadata("backup_created", json!(backup_created))
    }
}

/// Insert content at a specific line.
pub struct InsertContentTool;

#[async_trait]
impl ClientTool for InsertContentTool {
    fn name(&self) -> &'static str {
        "insert_content"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let path = match require_str(params, "path") {
            Ok(p) => p,
            Err(result) => return *result,
        };
        let content = match require_str(params, "content") {
            Ok(c) => c.to_string(),
            Err(result) => return *result,
        };
        let Some(line_number) = integer_param(params, "line_number") else {
            return ToolResult::error(
                ErrorCode::InvalidLineNumber,
                "line_number must be a valid integer",
            );
        };
        let validated = match ctx.validate_path(path) {
            Ok(p) => p,
            Err(result) => return *result,
        };

        if !validated.exists() {
            return ToolResult::error(
                ErrorCode::FileNotFound,
                format!("File '{path}' does not exist"),
            );
        }

        let existing = match tokio::fs::read_to_string(&validated).await {
            Ok(text) => text,
            Err(e) => return read_failure(path, &e),
        };
        let mut lines: Vec<String> = existing.split('\n').map(ToString::to_string).collect();

        if line_number < 1 || line_number > lines.len() as i64 + 1 {
            return ToolResult::error(
                ErrorCode::InvalidLineNumber,
                format!("Line number {line_number} is out of range"),
            )
            .with_detail("total_lines", json!(lines.len()))
            .with_detail("requested_line", json!(line_number));
        }

        if let Err(result) = create_backup(&validated).await {
            return *result;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        lines.insert((line_number - 1) as usize, content);
        let new_content = lines.join("\n");

        if let Err(e) = tokio::fs::write(&validated, &new_content).await {
            return ToolResult::error(ErrorCode::ToolExecutionError, e.to_string());
        }

        ctx.track_write(&validated, &new_content);

        ToolResult::success_empty()
            .with_metadata("operation", json!("content_inserted"))
            .with_metadata("path", json!(path))
            .with_metadata("line_number", json!(line_number))
            .with_metadata("lines_added", json!(1))
            .with_metadata("new_line_count", json!(lines.len()))
            .with_metadata("backup_created", json!(true))
    }
}

/// Replace all occurrences of a literal substring.
pub struct SearchAndReplaceTool;

#[async_trait]
impl ClientTool for SearchAndReplaceTool {
    fn name(&self) -> &'static str {
        "search_and_replace"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let path = match require_str(params, "path") {
            Ok(p) => p,
            Err(result) => return *result,
        };
        let search = match require_str(params, "search") {
            Ok(s) => s.to_string(),
            Err(result) => return *result,
        };
        let replace = match require_str(params, "replace") {
            Ok(r) => r.to_string(),
            Err(result) => return *result,
        };
        let validated = match ctx.validate_path(path) {
            Ok(p) => p,
            Err(result) => return *result,
        };

        if !validated.exists() {
            return ToolResult::error(
                ErrorCode::FileNotFound,
                format!("File '{path}' does not exist"),
            );
        }

        let original = match tokio::fs::read_to_string(&validated).await {
            Ok(text) => text,
            Err(e) => return read_failure(path, &e),
        };

        let replacements = original.matches(&search).count();
        if replacements == 0 {
            return ToolResult::error(
                ErrorCode::SearchTextNotFound,
                format!("Search text not found in file: '{search}'"),
            )
            .with_detail("search_text", json!(search))
            .with_detail("path", json!(path));
        }

        if let Err(result) = create_backup(&validated).await {
            return *result;
        }

        let new_content = original.replace(&search, &replace);
        if let Err(e) = tokio::fs::write(&validated, &new_content).await {
            return ToolResult::error(ErrorCode::ToolExecutionError, e.to_string());
        }

        ctx.track_write(&validated, &new_content);

        ToolResult::success_empty()
            .with_metadata("operation", json!("search_and_replace"))
            .with_metadata("path", json!(path))
            .with_metadata("replacements_made", json!(replacements))
            .with_metadata("backup_created", json!(true))
    }
}

/// Extract the requested line range, from either `line_range: [start, end]`
/// or separate `start_line`/`end_line` parameters.
fn line_range(params: &Map<String, Value>) -> Result<Option<(i64, i64)>, Box<ToolResult>> {
    if let Some(value) = params.get("line_range") {
        let pair = value
            .as_array()
            .filter(|a| a.len() == 2)
            .and_then(|a| Some((a[0].as_i64()?, a[1].as_i64()?)));
        return match pair {
            Some(range) => Ok(Some(range)),
            None => Err(Box::new(
                ToolResult::error(
                    ErrorCode::InvalidLineRange,
                    "line_range must be a list of [start_line, end_line]",
                )
                .with_detail("provided_line_range", value.clone()),
            )),
        };
    }

    let start = integer_param(params, "start_line");
    let end = integer_param(params, "end_line");
    match (start, end) {
        (None, None) => Ok(None),
        (s, e) => Ok(Some((s.unwrap_or(1), e.unwrap_or(i64::MAX)))),
    }
}

/// Copy the target to `<path>.backup` if it exists. Returns whether a
/// backup was made.
async fn create_backup(validated: &Path) -> Result<bool, Box<ToolResult>> {
    if !validated.exists() {
        return Ok(false);
    }
    let backup = backup_path(validated);
    tokio::fs::copy(validated, &backup).await.map_err(|e| {
        Box::new(
            ToolResult::error(
                ErrorCode::ToolExecutionError,
                format!("Failed creating backup: {e}"),
            )
            .with_detail("backup_path", json!(backup.display().to_string())),
        )
    })?;
    Ok(true)
}

fn backup_path(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".backup");
    std::path::PathBuf::from(os)
}

fn read_failure(path: &str, error: &std::io::Error) -> ToolResult {
    if error.kind() == std::io::ErrorKind::InvalidData {
        ToolResult::error(ErrorCode::EncodingError, "File contains non-UTF-8 content")
            .with_detail("path", json!(path))
    } else {
        ToolResult::error(ErrorCode::ToolExecutionError, error.to_string())
            .with_detail("path", json!(path))
    }
}

/// Line count as the model sees it: a single trailing newline does not
/// add a line.
fn effective_line_count(content: &str, split_len: usize) -> usize {
    if content.ends_with('\n') && split_len > 0 {
        split_len - 1
    } else {
        split_len
    }
}

/// Line count of written content: empty content is zero lines.
fn written_line_count(content: &str) -> usize {
    if content.is_empty() {
        return 0;
    }
    effective_line_count(content, content.split('\n').count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{context, flat};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_whole_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        let ctx = context(dir.path());

        let result = ReadFileTool
            .execute(&flat(&[("path", json!("a.txt"))]), &ctx)
            .await;
        assert!(result.is_success());
        assert_eq!(result.data.unwrap(), json!("one\ntwo\nthree\n"));
        assert_eq!(result.metadata["line_count"], json!(3));
        assert_eq!(result.metadata["read_lines"], json!("all"));
    }

    #[tokio::test]
    async fn test_read_single_line_range() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        let ctx = context(dir.path());

        let result = ReadFileTool
            .execute(
                &flat(&[("path", json!("a.txt")), ("line_range", json!([2, 2]))]),
                &ctx,
            )
            .await;
        assert!(result.is_success());
        assert_eq!(result.data.unwrap(), json!("two"));
        assert_eq!(result.metadata["read_lines"], json!("2-2"));
    }

    #[tokio::test]
    async fn test_read_out_of_range() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        let ctx = context(dir.path());

        let result = ReadFileTool
            .execute(
                &flat(&[("path", json!("a.txt")), ("line_range", json!([5, 9]))]),
                &ctx,
            )
            .await;
        assert_eq!(result.error.unwrap().code, ErrorCode::InvalidLineRange);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let result = ReadFileTool
            .execute(&flat(&[("path", json!("ghost.txt"))]), &ctx)
            .await;
        assert_eq!(result.error.unwrap().code, ErrorCode::FileNotFound);
    }

    #[tokio::test]
    async fn test_read_binary_is_encoding_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bin.dat"), [0x00u8, 0xFF, 0xFE]).unwrap();
        let ctx = context(dir.path());
        let result = ReadFileTool
            .execute(&flat(&[("path", json!("bin.dat"))]), &ctx)
            .await;
        assert_eq!(result.error.unwrap().code, ErrorCode::EncodingError);
    }

    #[tokio::test]
    async fn test_read_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let result = ReadFileTool
            .execute(&flat(&[("path", json!("../../etc/passwd"))]), &ctx)
            .await;
        assert_eq!(result.error.unwrap().code, ErrorCode::SecurityError);
    }

    #[tokio::test]
    async fn test_write_new_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let result = WriteToFileTool
            .execute(
                &flat(&[
                    ("path", json!("sub/new.txt")),
                    ("content", json!("alpha\nbeta\n")),
                    ("line_count", json!(2)),
                ]),
                &ctx,
            )
            .await;
        assert!(result.is_success());
        assert_eq!(result.metadata["operation"], json!("file_created"));
        assert_eq!(result.metadata["backup_created"], json!(false));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sub/new.txt")).unwrap(),
            "alpha\nbeta\n"
        );
    }

    #[tokio::test]
    async fn test_write_existing_creates_backup() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let ctx = context(dir.path());

        let result = WriteToFileTool
            .execute(
                &flat(&[
                    ("path", json!("a.txt")),
                    ("content", json!("new")),
                    ("line_count", json!(1)),
                ]),
                &ctx,
            )
            .await;
        assert!(result.is_success());
        assert_eq!(result.metadata["operation"], json!("file_updated"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt.backup")).unwrap(),
            "old"
        );
    }

    #[tokio::test]
    async fn test_write_empty_content() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let result = WriteToFileTool
            .execute(
                &flat(&[
                    ("path", json!("empty.txt")),
                    ("content", json!("")),
                    ("line_count", json!(0)),
                ]),
                &ctx,
            )
            .await;
        assert!(result.is_success());
        assert_eq!(result.metadata["bytes_written"], json!(0));
        assert_eq!(result.metadata["line_count"], json!(0));
    }

    #[tokio::test]
    async fn test_write_line_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        let result = WriteToFileTool
            .execute(
                &flat(&[
                    ("path", json!("a.txt")),
                    ("content", json!("one\ntwo\n")),
                    ("line_count", json!(5)),
                ]),
                &ctx,
            )
            .await;
        assert_eq!(result.error.unwrap().code, ErrorCode::LineCountMismatch);
    }

    #[tokio::test]
    async fn test_write_marks_context_stale() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), "v1").unwrap();
        let ctx = context(dir.path());

        // Simulate the earlier read
        let read = ReadFileTool
            .execute(&flat(&[("path", json!("a.py"))]), &ctx)
            .await;
        assert!(read.is_success());

        let write = WriteToFileTool
            .execute(
                &flat(&[
                    ("path", json!("a.py")),
                    ("content", json!("v2")),
                    ("line_count", json!(1)),
                ]),
                &ctx,
            )
            .await;
        assert!(write.is_success());

        let stale = ctx
            .tracker
            .lock()
            .unwrap()
            .check(&dir.path().join("a.py"))
            .stale;
        assert!(stale);
    }

    #[tokio::test]
    async fn test_insert_content() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\nthree").unwrap();
        let ctx = context(dir.path());

        let result = InsertContentTool
            .execute(
                &flat(&[
                    ("path", json!("a.txt")),
                    ("line_number", json!(2)),
                    ("content", json!("two")),
                ]),
                &ctx,
            )
            .await;
        assert!(result.is_success());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "one\ntwo\nthree"
        );
    }

    #[tokio::test]
    async fn test_insert_line_number_bounds() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        let ctx = context(dir.path());

        // N+1 appends
        let append = InsertContentTool
            .execute(
                &flat(&[
                    ("path", json!("a.txt")),
                    ("line_number", json!(2)),
                    ("content", json!("two")),
                ]),
                &ctx,
            )
            .await;
        assert!(append.is_success());

        // Past N+1 is out of range
        let result = InsertContentTool
            .execute(
                &flat(&[
                    ("path", json!("a.txt")),
                    ("line_number", json!(10)),
                    ("content", json!("x")),
                ]),
                &ctx,
            )
            .await;
        assert_eq!(result.error.unwrap().code, ErrorCode::InvalidLineNumber);
    }

    #[tokio::test]
    async fn test_search_and_replace_all_occurrences() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo bar foo baz foo").unwrap();
        let ctx = context(dir.path());

        let result = SearchAndReplaceTool
            .execute(
                &flat(&[
                    ("path", json!("a.txt")),
                    ("search", json!("foo")),
                    ("replace", json!("qux")),
                ]),
                &ctx,
            )
            .await;
        assert!(result.is_success());
        assert_eq!(result.metadata["replacements_made"], json!(3));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "qux bar qux baz qux"
        );
        // Backup holds the original
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt.backup")).unwrap(),
            "foo bar foo baz foo"
        );
    }

    #[tokio::test]
    async fn test_search_text_not_found() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing here").unwrap();
        let ctx = context(dir.path());

        let result = SearchAndReplaceTool
            .execute(
                &flat(&[
                    ("path", json!("a.txt")),
                    ("search", json!("missing")),
                    ("replace", json!("x")),
                ]),
                &ctx,
            )
            .await;
        assert_eq!(result.error.unwrap().code, ErrorCode::SearchTextNotFound);
    }

    #[test]
    fn test_line_counting_rules() {
        assert_eq!(written_line_count(""), 0);
        assert_eq!(written_line_count("one"), 1);
        assert_eq!(written_line_count("one\n"), 1);
        assert_eq!(written_line_count("one\ntwo"), 2);
        assert_eq!(written_line_count("one\ntwo\n"), 2);
        assert_eq!(written_line_count("\n"), 1);
    }
}
