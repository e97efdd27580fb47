//! Search and listing tools.

use async_trait::async_trait;
use globset::Glob;
use regex::RegexBuilder;
use serde_json::{Map, Value, json};
use std::path::Path;
use walkdir::WalkDir;

use gambiarra_core::{ErrorCode, RiskLevel, ToolResult};

use crate::tools::{ClientTool, ToolContext, bool_param, require_str};

/// Bytes inspected for binary detection.
const BINARY_SNIFF_BYTES: usize = 1024;

/// Search files under a directory with a regex.
pub struct SearchFilesTool;

#[async_trait]
impl ClientTool for SearchFilesTool {
    fn name(&self) -> &'static str {
        "search_files"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let path = match require_str(params, "path") {
            Ok(p) => p,
            Err(result) => return *result,
        };
        let pattern = match require_str(params, "regex") {
            Ok(r) => r,
            Err(result) => return *result,
        };
        let file_pattern = params
            .get("file_pattern")
            .and_then(Value::as_str)
            .unwrap_or("*");

        let regex = match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .multi_line(true)
            .build()
        {
            Ok(regex) => regex,
            Err(e) => {
                return ToolResult::error(
                    ErrorCode::InvalidRegex,
                    format!("Invalid regex pattern: {e}"),
                )
                .with_detail("pattern", json!(pattern));
            },
        };

        let name_matcher = match Glob::new(file_pattern) {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => {
                return ToolResult::error(
                    ErrorCode::InvalidRegex,
                    format!("Invalid file pattern: {e}"),
                )
                .with_detail("file_pattern", json!(file_pattern));
            },
        };

        let search_dir = match ctx.validate_path(path) {
            Ok(p) => p,
            Err(result) => return *result,
        };
        if !search_dir.exists() {
            return ToolResult::error(
                ErrorCode::PathNotFound,
                format!("Search path '{path}' does not exist"),
            );
        }

        let mut matches = Vec::new();
        let mut files_searched = 0usize;
        let mut total_matches = 0usize;

        for entry in WalkDir::new(&search_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            if ctx.paths.is_ignored_abs(entry.path()) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !name_matcher.is_match(file_name.as_ref()) {
                continue;
            }
            if is_binary(entry.path()) {
                continue;
            }

            let Ok(content) = tokio::fs::read_to_string(entry.path()).await else {
                continue;
            };
            files_searched += 1;

            let mut file_matches = Vec::new();
            for (index, line) in content.split('\n').enumerate() {
                if let Some(found) = regex.find(line) {
                    file_matches.push(json!({
                        "line": index + 1,
                        "content": line.trim(),
                        "match": found.as_str(),
                    }));
                }
            }

            if !file_matches.is_empty() {
                total_matches += file_matches.len();
                let relative = entry
                    .path()
                    .strip_prefix(&search_dir)
                    .unwrap_or(entry.path());
                matches.push(json!({
                    "file": relative.display().to_string(),
                    "matches": file_matches,
                }));
            }
        }

        ToolResult::success(json!(matches))
            .with_metadata("files_searched", json!(files_searched))
            .with_metadata("total_matches", json!(total_matches))
            .with_metadata("pattern", json!(pattern))
            .with_metadata("file_pattern", json!(file_pattern))
    }
}

/// List a directory, one level or recursively.
pub struct ListFilesTool;

#[async_trait]
impl ClientTool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let path = match require_str(params, "path") {
            Ok(p) => p,
            Err(result) => return *result,
        };
        let recursive = bool_param(params, "recursive").unwrap_or(false);

        let dir = match ctx.validate_path(path) {
            Ok(p) => p,
            Err(result) => return *result,
        };
        if !dir.exists() {
            return ToolResult::error(
                ErrorCode::PathNotFound,
                format!("Directory '{path}' does not exist"),
            );
        }
        if !dir.is_dir() {
            return ToolResult::error(
                ErrorCode::NotADirectory,
                format!("Path '{path}' is not a directory"),
            );
        }

        let mut files = Vec::new();
        let mut directories = Vec::new();

        let max_depth = if recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(Result::ok)
        {
            if ctx.paths.is_ignored_abs(entry.path()) {
                continue;
            }
            let name = entry
                .path()
                .strip_prefix(&dir)
                .unwrap_or(entry.path())
                .display()
                .to_string();

            if entry.file_type().is_dir() {
                directories.push(json!({ "name": name, "type": "directory" }));
            } else if entry.file_type().is_file() {
                let metadata = entry.metadata().ok();
                let size = metadata.as_ref().map_or(0, std::fs::Metadata::len);
                let modified = metadata
                    .and_then(|m| m.modified().ok())
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_secs());
                files.push(json!({
                    "name": name,
                    "size": size,
                    "modified": modified,
                    "type": "file",
                }));
            }
        }

        sort_by_name(&mut files);
        sort_by_name(&mut directories);

        let file_count = files.len();
        let directory_count = directories.len();
        ToolResult::success(json!({ "files": files, "directories": directories }))
            .with_metadata("path", json!(path))
            .with_metadata("file_count", json!(file_count))
            .with_metadata("directory_count", json!(directory_count))
            .with_metadata("recursive", json!(recursive))
    }
}

/// Regex-based scan of a source file for definition names.
pub struct ListCodeDefinitionNamesTool;

#[async_trait]
impl ClientTool for ListCodeDefinitionNamesTool {
    fn name(&self) -> &'static str {
        "list_code_definition_names"
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
            );
        }

        let content = match tokio::fs::read_to_string(&validated).await {
            Ok(text) => text,
            Err(_) => {
                return ToolResult::error(
                    ErrorCode::EncodingError,
                    "File contains non-UTF-8 content",
                );
            },
        };

        let definitions = scan_definitions(&content);
        let count = definitions.len();
        ToolResult::success(json!({ "definitions": definitions }))
            .with_metadata("path", json!(path))
            .with_metadata("definition_count", json!(count))
    }
}

fn sort_by_name(entries: &mut [Value]) {
    entries.sort_by(|a, b| {
        let left = a["name"].as_str().unwrap_or("");
        let right = b["name"].as_str().unwrap_or("");
        left.cmp(right)
    });
}

/// Null byte in the first kibibyte means binary.
fn is_binary(path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return true;
    };
    let sniff = bytes.len().min(BINARY_SNIFF_BYTES);
    bytes[..sniff].contains(&0)
}

/// One definition pattern per language family; the kind label is the
/// matched keyword.
fn scan_definitions(content: &str) -> Vec<Value> {
    let pattern = regex::Regex::new(
        r"^\s*(?:pub\s+)?(fn|struct|enum|trait|impl|def|class|function|interface|type)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap_or_else(|e| unreachable!("fixed pattern failed to compile: {e}"));

    let mut definitions = Vec::new();
    for (index, line) in content.split('\n').enumerate() {
        if let Some(caps) = pattern.captures(line) {
            definitions.push(json!({
                "line": index + 1,
                "kind": &caps[1],
                "name": &caps[2],
            }));
        }
    }
    definitions
}
