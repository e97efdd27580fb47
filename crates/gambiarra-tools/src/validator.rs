//! Semantic validation of flat tool parameters against the registry schema.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::registry::{ParamKind, ToolDefinition};

/// A parameter failed validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required parameter is absent.
    #[error("Missing required parameter '{parameter}' for tool '{tool}'")]
    MissingParameter {
        /// Tool name.
        tool: String,
        /// Missing parameter name.
        parameter: String,
    },

    /// A parameter has the wrong type or an invalid value.
    #[error("Parameter '{parameter}' {problem}")]
    InvalidValue {
        /// Offending parameter name.
        parameter: String,
        /// What is wrong with it.
        problem: String,
    },
}

/// Validate flat parameters against a tool definition.
///
/// Checks required presence, value kinds, non-empty strings, and
/// non-negative integers. Unknown extra parameters are logged but not
/// fatal.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_parameters(
    def: &ToolDefinition,
    params: &Map<String, Value>,
) -> Result<(), ValidationError> {
    for spec in def.parameters {
        match params.get(spec.name) {
            None => {
                if spec.required {
                    return Err(ValidationError::MissingParameter {
                        tool: def.name.to_string(),
                        parameter: spec.name.to_string(),
                    });
                }
            },
            Some(value) => check_value(spec.name, spec.kind, value)?,
        }
    }

    for key in params.keys() {
        if !def.parameters.iter().any(|spec| spec.name == key) {
            warn!(tool = def.name, parameter = %key, "unknown parameter ignored");
        }
    }

    Ok(())
}

fn check_value(name: &str, kind: ParamKind, value: &Value) -> Result<(), ValidationError> {
    match kind {
        ParamKind::String => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            Some(_) => Err(ValidationError::InvalidValue {
                parameter: name.to_string(),
                problem: "must be a non-empty string".to_string(),
            }),
            None => Err(ValidationError::InvalidValue {
                parameter: name.to_string(),
                problem: "must be a string".to_string(),
            }),
        },
        ParamKind::Integer => {
            // Accept both native integers and digit strings, as peers may
            // serialize either.
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match parsed {
                Some(n) if n >= 0 => Ok(()),
                Some(_) => Err(ValidationError::InvalidValue {
                    parameter: name.to_string(),
                    problem: "must be a non-negative integer".to_string(),
                }),
                None => Err(ValidationError::InvalidValue {
                    parameter: name.to_string(),
                    problem: "must be a valid integer".to_string(),
                }),
            }
        },
        ParamKind::Boolean => match value {
            Value::Bool(_) => Ok(()),
            Value::String(s) if s == "true" || s == "false" => Ok(()),
            _ => Err(ValidationError::InvalidValue {
                parameter: name.to_string(),
                problem: "must be 'true' or 'false'".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_valid_call() {
        let registry = ToolRegistry::with_defaults();
        let def = registry.get("write_to_file").unwrap();
        let result = validate_parameters(
            def,
            &params(&[
                ("path", json!("a.txt")),
                ("content", json!("hello")),
                ("line_count", json!(1)),
            ]),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_required() {
        let registry = ToolRegistry::with_defaults();
        let def = registry.get("search_files").unwrap();
        let err = validate_parameters(def, &params(&[("path", json!("src"))])).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingParameter { ref parameter, .. } if parameter == "regex"
        ));
    }

    #[test]
    fn test_empty_string_rejected() {
        let registry = ToolRegistry::with_defaults();
        let def = registry.get("read_file").unwrap();
        let err = validate_parameters(def, &params(&[("path", json!("   "))])).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_negative_integer_rejected() {
        let registry = ToolRegistry::with_defaults();
        let def = registry.get("write_to_file").unwrap();
        let err = validate_parameters(
            def,
            &params(&[
                ("path", json!("a.txt")),
                ("content", json!("x")),
                ("line_count", json!(-1)),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_integer_as_digit_string_accepted() {
        let registry = ToolRegistry::with_defaults();
        let def = registry.get("insert_content").unwrap();
        let result = validate_parameters(
            def,
            &params(&[
                ("path", json!("a.txt")),
                ("line_number", json!("3")),
                ("content", json!("x")),
            ]),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_boolean_forms() {
        let registry = ToolRegistry::with_defaults();
        let def = registry.get("list_files").unwrap();
        assert!(
            validate_parameters(
                def,
                &params(&[("path", json!(".")), ("recursive", json!(true))])
            )
            .is_ok()
        );
        assert!(
            validate_parameters(
                def,
                &params(&[("path", json!(".")), ("recursive", json!("false"))])
            )
            .is_ok()
        );
        assert!(
            validate_parameters(
                def,
                &params(&[("path", json!(".")), ("recursive", json!("maybe"))])
            )
            .is_err()
        );
    }

    #[test]
    fn test_optional_param_absent_ok() {
        let registry = ToolRegistry::with_defaults();
        let def = registry.get("list_files").unwrap();
        assert!(validate_parameters(def, &params(&[("path", json!("."))])).is_ok());
    }
}
