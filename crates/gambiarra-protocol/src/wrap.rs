//! Parameter wrapping.
//!
//! On the wire every tool's parameters take the shape `{"args": {…}}`,
//! except `read_file`, whose path nests one level deeper:
//! `{"args": {"file": {"path": …}}}`. The server wraps flat parameters
//! before sending; the client unwraps back to flat keyword arguments
//! before invoking its tool implementation.

use serde_json::{Map, Value, json};

/// Wrap flat parameters into the client-facing wire shape.
#[must_use]
pub fn wrap_parameters(tool_name: &str, params: &Map<String, Value>) -> Value {
    if tool_name == "read_file" {
        let path = params.get("path").cloned().unwrap_or(Value::String(String::new()));
        let mut file = Map::new();
        file.insert("path".to_string(), path);
        // Carry any extra read_file parameters (line_range) alongside `file`
        let mut args = Map::new();
        args.insert("file".to_string(), Value::Object(file));
        for (key, value) in params {
            if key != "path" {
                args.insert(key.clone(), value.clone());
            }
        }
        return json!({ "args": args });
    }

    json!({ "args": params })
}

/// Unwrap wire-shaped parameters back into flat keyword arguments.
///
/// Parameters already in flat form pass through untouched, so the client
/// tolerates older peers that never learned to wrap.
#[must_use]
pub fn unwrap_parameters(tool_name: &str, parameters: &Value) -> Map<String, Value> {
    let Some(args) = parameters.get("args") else {
        return parameters.as_object().cloned().unwrap_or_default();
    };
    let Some(args) = args.as_object() else {
        return Map::new();
    };

    if tool_name == "read_file" {
        if let Some(Value::Object(file)) = args.get("file") {
            let mut flat = Map::new();
            if let Some(path) = file.get("path") {
                flat.insert("path".to_string(), path.clone());
            }
            for (key, value) in args {
                if key != "file" {
                    flat.insert(key.clone(), value.clone());
                }
            }
            return flat;
        }
    }

    args.clone()
}
