//! XML tool-call extraction.
//!
//! Assistant text embeds tool calls as XML-ish blocks: one outer element
//! named by the tool wrapping an `<args>` child (for `read_file` the
//! `<args>` wraps a `<file>` wrapping a `<path>`). The extractor scans the
//! fully-accumulated assistant turn and returns the valid calls in source
//! order. Malformed, unknown-tool, and failing-validation blocks are
//! skipped silently; the turn still completes.
//!
//! Regex scanning is used instead of a DOM parser: no entity expansion and
//! no external entity resolution ever happens.

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::entities::{escape, unescape};
use crate::registry::ToolRegistry;
use crate::validator::validate_parameters;

/// A validated tool call extracted from assistant text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    /// Tool name.
    pub name: String,
    /// Flat parameter map.
    pub parameters: Map<String, Value>,
}

/// Compiled extraction patterns, shared process-wide.
#[derive(Debug)]
pub struct ToolCallExtractor {
    read_file_path: Regex,
    read_file_shape: Regex,
    path: Regex,
    content: Regex,
    line_count: Regex,
    regex: Regex,
    file_pattern: Regex,
    recursive: Regex,
    command: Regex,
    search: Regex,
    replace: Regex,
    line_number: Regex,
    question: Regex,
    result: Regex,
    todos: Regex,
}

impl ToolCallExtractor {
    /// Compile the extraction patterns.
    ///
    /// # Panics
    ///
    /// Never panics in practice; the patterns are fixed and valid.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn new() -> Self {
        let field = |name: &str, value: &str| {
            Regex::new(&format!("(?s)<args>.*?<{name}>{value}</{name}>.*?</args>"))
                .unwrap_or_else(|e| unreachable!("fixed pattern failed to compile: {e}"))
        };
        Self {
            read_file_path: Regex::new(
                r"(?s)<args>.*?<file>.*?<path>(.*?)</path>.*?</file>.*?</args>",
            )
            .unwrap_or_else(|e| unreachable!("fixed pattern failed to compile: {e}")),
            read_file_shape: Regex::new(r"(?s)<args>.*<file>.*<path>.*</path>.*</file>.*</args>")
                .unwrap_or_else(|e| unreachable!("fixed pattern failed to compile: {e}")),
            path: field("path", "(.*?)"),
            content: field("content", "(.*?)"),
            line_count: field("line_count", r"(\d+)"),
            regex: field("regex", "(.*?)"),
            file_pattern: field("file_pattern", "(.*?)"),
            recursive: field("recursive", "(true|false)"),
            command: field("command", "(.*?)"),
            search: field("search", "(.*?)"),
            replace: field("replace", "(.*?)"),
            line_number: field("line_number", r"(\d+)"),
            question: field("question", "(.*?)"),
            result: field("result", "(.*?)"),
            todos: field("todos", "(.*?)"),
        }
    }

    /// Extract every valid tool call from `text`, in source order.
    #[must_use]
    pub fn extract(&self, registry: &ToolRegistry, text: &str) -> Vec<ParsedToolCall> {
        let mut opens: Vec<(usize, &str)> = Vec::new();
        for name in registry.names() {
            let Some(def) = registry.get(&name) else {
                continue;
            };
            let open_tag = format!("<{}>", def.name);
            for (idx, _) in text.match_indices(&open_tag) {
                opens.push((idx, def.name));
            }
        }
        opens.sort_by_key(|(idx, _)| *idx);

        let mut calls = Vec::new();
        let mut consumed_until = 0;
        for (start, name) in opens {
            // A tag inside an already-consumed block (e.g. inside a
            // <content> payload) is part of that payload, not a call.
            if start < consumed_until {
                continue;
            }
            let close_tag = format!("</{name}>");
            let Some(rel_close) = text[start..].find(&close_tag) else {
                warn!(tool = name, "tool call missing closing tag, skipping");
                continue;
            };
            let end = start + rel_close + close_tag.len();
            let region = &text[start..end];

            match self.parse_region(registry, name, region) {
                Some(call) => {
                    consumed_until = end;
                    calls.push(call);
                },
                None => {
                    consumed_until = end;
                },
            }
        }
        calls
    }

    /// Parse one `<tool>…</tool>` region. Returns `None` on any structural
    /// or semantic failure.
    fn parse_region(
        &self,
        registry: &ToolRegistry,
        name: &str,
        region: &str,
    ) -> Option<ParsedToolCall> {
        let def = registry.get(name)?;

        if !region.contains("<args>") {
            warn!(tool = name, "tool call missing <args> element, skipping");
            return None;
        }
        if name == "read_file" && !self.read_file_shape.is_match(region) {
            warn!(tool = name, "read_file has incorrect nested structure, skipping");
            return None;
        }

        let mut params = Map::new();

        match name {
            "read_file" => {
                if let Some(cap) = self.read_file_path.captures(region) {
                    params.insert(
                        "path".to_string(),
                        Value::String(unescape(cap[1].trim())),
                    );
                }
            },
            "write_to_file" => {
                self.put_trimmed(&self.path, region, &mut params, "path");
                self.put_raw(&self.content, region, &mut params, "content");
                self.put_integer(&self.line_count, region, &mut params, "line_count");
            },
            "list_files" => {
                self.put_trimmed(&self.path, region, &mut params, "path");
                if let Some(cap) = self.recursive.captures(region) {
                    params.insert("recursive".to_string(), Value::Bool(&cap[1] == "true"));
                }
            },
            "search_files" => {
                self.put_trimmed(&self.path, region, &mut params, "path");
                self.put_trimmed(&self.regex, region, &mut params, "regex");
                self.put_trimmed(&self.file_pattern, region, &mut params, "file_pattern");
            },
            "execute_command" => {
                self.put_trimmed(&self.command, region, &mut params, "command");
            },
            "search_and_replace" => {
                self.put_trimmed(&self.path, region, &mut params, "path");
                self.put_raw(&self.search, region, &mut params, "search");
                self.put_raw(&self.replace, region, &mut params, "replace");
            },
            "insert_content" => {
                self.put_trimmed(&self.path, region, &mut params, "path");
                self.put_integer(&self.line_number, region, &mut params, "line_number");
                self.put_raw(&self.content, region, &mut params, "content");
            },
            "list_code_definition_names" => {
                self.put_trimmed(&self.path, region, &mut params, "path");
            },
            "attempt_completion" => {
                self.put_raw(&self.result, region, &mut params, "result");
            },
            "ask_followup_question" => {
                self.put_raw(&self.question, region, &mut params, "question");
            },
            "update_todo_list" => {
                self.put_raw(&self.todos, region, &mut params, "todos");
            },
            _ => return None,
        }

        if let Err(e) = validate_parameters(def, &params) {
            warn!(tool = name, error = %e, "tool call failed validation, skipping");
            return None;
        }

        Some(ParsedToolCall {
            name: name.to_string(),
            parameters: params,
        })
    }

    /// Insert a string field with surrounding whitespace trimmed.
    fn put_trimmed(&self, field: &Regex, region: &str, params: &mut Map<String, Value>, key: &str) {
        if let Some(cap) = field.captures(region) {
            params.insert(key.to_string(), Value::String(unescape(cap[1].trim())));
        }
    }

    /// Insert a string field verbatim (entity-unescaped, whitespace kept).
    fn put_raw(&self, field: &Regex, region: &str, params: &mut Map<String, Value>, key: &str) {
        if let Some(cap) = field.captures(region) {
            params.insert(key.to_string(), Value::String(unescape(&cap[1])));
        }
    }

    /// Insert an integer field.
    fn put_integer(&self, field: &Regex, region: &str, params: &mut Map<String, Value>, key: &str) {
        if let Some(cap) = field.captures(region)
            && let Ok(n) = cap[1].parse::<u64>()
        {
            params.insert(key.to_string(), Value::Number(n.into()));
        }
    }
}

impl Default for ToolCallExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a tool call back into its XML form.
///
/// Inverse of extraction for every registered tool:
/// `extract(serialize(call)) == [call]`.
#[must_use]
pub fn serialize_tool_call(
    registry: &ToolRegistry,
    name: &str,
    params: &Map<String, Value>,
) -> String {
    let Some(def) = registry.get(name) else {
        return String::new();
    };

    if name == "read_file" {
        let path = params.get("path").and_then(Value::as_str).unwrap_or("");
        return format!(
            "<read_file><args><file><path>{}</path></file></args></read_file>",
            escape(path)
        );
    }

    let mut body = String::new();
    for spec in def.parameters {
        let Some(value) = params.get(spec.name) else {
            continue;
        };
        let rendered = match value {
            Value::String(s) => escape(s),
            other => other.to_string(),
        };
        body.push_str(&format!("<{0}>{1}</{0}>", spec.name, rendered));
    }
    format!("<{name}><args>{body}</args></{name}>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        ToolRegistry::with_defaults()
    }

    fn extractor() -> ToolCallExtractor {
        ToolCallExtractor::new()
    }

    #[test]
    fn test_read_file_nested_structure() {
        let text = "Let me look.\n<read_file><args><file><path>README.md</path></file></args></read_file>";
        let calls = extractor().extract(&registry(), text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].parameters["path"], json!("README.md"));
    }

    #[test]
    fn test_read_file_flat_structure_rejected() {
        // Missing the <file> wrapper
        let text = "<read_file><args><path>README.md</path></args></read_file>";
        assert!(extractor().extract(&registry(), text).is_empty());
    }

    #[test]
    fn test_write_to_file_preserves_content_whitespace() {
        let text = "<write_to_file><args><path>a.py</path><content>line one\n  indented\n</content><line_count>2</line_count></args></write_to_file>";
        let calls = extractor().extract(&registry(), text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parameters["content"], json!("line one\n  indented\n"));
        assert_eq!(calls[0].parameters["line_count"], json!(2));
    }

    #[test]
    fn test_scalar_values_trimmed() {
        let text = "<execute_command><args><command>  ls -la  </command></args></execute_command>";
        let calls = extractor().extract(&registry(), text);
        assert_eq!(calls[0].parameters["command"], json!("ls -la"));
    }

    #[test]
    fn test_entities_unescaped() {
        let text = "<execute_command><args><command>grep &quot;a &amp; b&quot; x.txt</command></args></execute_command>";
        let calls = extractor().extract(&registry(), text);
        assert_eq!(calls[0].parameters["command"], json!("grep \"a & b\" x.txt"));
    }

    #[test]
    fn test_unknown_tool_skipped() {
        let text = "<launch_missiles><args><target>moon</target></args></launch_missiles>";
        assert!(extractor().extract(&registry(), text).is_empty());
    }

    #[test]
    fn test_missing_args_skipped() {
        let text = "<list_files><path>.</path></list_files>";
        assert!(extractor().extract(&registry(), text).is_empty());
    }

    #[test]
    fn test_missing_closing_tag_skipped() {
        let text = "<list_files><args><path>.</path></args>";
        assert!(extractor().extract(&registry(), text).is_empty());
    }

    #[test]
    fn test_missing_required_param_skipped() {
        // search_files without the regex parameter
        let text = "<search_files><args><path>src</path></args></search_files>";
        assert!(extractor().extract(&registry(), text).is_empty());
    }

    #[test]
    fn test_multiple_calls_in_source_order() {
        let text = "\
            <list_files><args><path>.</path><recursive>true</recursive></args></list_files>\n\
            then\n\
            <read_file><args><file><path>a.py</path></file></args></read_file>";
        let calls = extractor().extract(&registry(), text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "list_files");
        assert_eq!(calls[0].parameters["recursive"], json!(true));
        assert_eq!(calls[1].name, "read_file");
    }

    #[test]
    fn test_malformed_block_does_not_poison_later_calls() {
        let text = "\
            <search_files><args><path>src</path></args></search_files>\n\
            <list_files><args><path>.</path></args></list_files>";
        let calls = extractor().extract(&registry(), text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "list_files");
    }

    #[test]
    fn test_tool_tag_inside_content_not_extracted() {
        let text = "<write_to_file><args><path>doc.md</path><content>Use <read_file><args><file><path>x</path></file></args></read_file> to read.</content><line_count>1</line_count></args></write_to_file>";
        let calls = extractor().extract(&registry(), text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "write_to_file");
    }

    #[test]
    fn test_serialize_extract_roundtrip_all_tools() {
        let registry = registry();
        let extractor = extractor();
        let cases: Vec<(&str, Map<String, Value>)> = vec![
            ("read_file", flat(&[("path", json!("src/lib.rs"))])),
            (
                "write_to_file",
                flat(&[
                    ("path", json!("a.txt")),
                    ("content", json!("alpha\nbeta")),
                    ("line_count", json!(2)),
                ]),
            ),
            (
                "list_files",
                flat(&[("path", json!(".")), ("recursive", json!(false))]),
            ),
            (
                "search_files",
                flat(&[
                    ("path", json!("src")),
                    ("regex", json!("fn main")),
                    ("file_pattern", json!("*.rs")),
                ]),
            ),
            ("execute_command", flat(&[("command", json!("cargo check"))])),
            (
                "search_and_replace",
                flat(&[
                    ("path", json!("a.txt")),
                    ("search", json!("old")),
                    ("replace", json!("new")),
                ]),
            ),
            (
                "insert_content",
                flat(&[
                    ("path", json!("a.txt")),
                    ("line_number", json!(1)),
                    ("content", json!("first line")),
                ]),
            ),
            (
                "list_code_definition_names",
                flat(&[("path", json!("src/lib.rs"))]),
            ),
            ("attempt_completion", flat(&[("result", json!("All done."))])),
            (
                "ask_followup_question",
                flat(&[("question", json!("Which file?"))]),
            ),
            (
                "update_todo_list",
                flat(&[("todos", json!("- [ ] item one\n- [x] item two"))]),
            ),
        ];

        for (name, params) in cases {
            let xml = serialize_tool_call(&registry, name, &params);
            let calls = extractor.extract(&registry, &xml);
            assert_eq!(calls.len(), 1, "tool {name}: {xml}");
            assert_eq!(calls[0].name, name);
            assert_eq!(calls[0].parameters, params, "tool {name}");
        }
    }

    fn flat(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }
}
