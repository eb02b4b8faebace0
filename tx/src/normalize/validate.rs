//! Parameter alias remapping and schema validation

use serde_json::{Map, Value};
use tracing::debug;

use crate::tools::{ToolContract, ToolError};

use super::coerce::coerce_value;
use super::repair::Repair;

/// `filePath`, `file-path` and `File Path` all become `file_path`
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.trim().chars() {
        if ch == '-' || ch == ' ' || ch == '.' {
            out.push('_');
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Map alternative parameter names onto canonical ones.
///
/// A canonical key always wins over an alias carrying the same meaning.
/// Unrecognized keys are kept so validation can report them.
pub fn remap_aliases(args: Map<String, Value>, contract: &ToolContract) -> (Map<String, Value>, Vec<Repair>) {
    let mut out = Map::new();
    let mut repairs = Vec::new();
    let mut deferred = Vec::new();

    for (key, value) in args {
        let normalized = normalize_key(&key);
        if contract.param(&normalized).is_some() {
            if normalized != key {
                repairs.push(Repair::Alias {
                    from: key.clone(),
                    to: normalized.clone(),
                });
            }
            out.insert(normalized, value);
        } else {
            deferred.push((key, normalized, value));
        }
    }

    for (key, normalized, value) in deferred {
        let target = contract
            .params
            .iter()
            .find(|p| p.aliases.contains(&normalized.as_str()))
            .map(|p| p.name);
        match target {
            Some(canonical) if !out.contains_key(canonical) => {
                debug!(from = %key, to = canonical, "remap_aliases: alias applied");
                repairs.push(Repair::Alias {
                    from: key,
                    to: canonical.to_string(),
                });
                out.insert(canonical.to_string(), value);
            }
            Some(canonical) => {
                debug!(from = %key, to = canonical, "remap_aliases: canonical already present, alias dropped");
            }
            None => {
                out.insert(key, value);
            }
        }
    }

    (out, repairs)
}

/// Coerce declared parameters and drop nulls on optional ones
pub fn coerce_arguments(args: &mut Map<String, Value>, contract: &ToolContract) -> Vec<Repair> {
    let mut repairs = Vec::new();
    for param in &contract.params {
        let Some(value) = args.get(param.name) else {
            continue;
        };
        if value.is_null() {
            if !param.required {
                args.remove(param.name);
                repairs.push(Repair::DroppedNull {
                    param: param.name.to_string(),
                });
            }
            continue;
        }
        if let Some(coerced) = coerce_value(value, param.ty) {
            debug!(param = param.name, "coerce_arguments: coerced");
            args.insert(param.name.to_string(), coerced);
            repairs.push(Repair::Coerced {
                param: param.name.to_string(),
            });
        }
    }
    repairs
}

fn invalid(contract: &ToolContract, code: &'static str, problem: String) -> ToolError {
    ToolError::validation(
        code,
        format!(
            "{}. Accepted parameters: {}. Example: {}",
            problem,
            contract.describe_params(),
            contract.usage()
        ),
    )
}

/// Check arguments against the contract; `additionalProperties` is forbidden
pub fn validate_arguments(args: &Map<String, Value>, contract: &ToolContract) -> Result<(), ToolError> {
    let mut unknown: Vec<&str> = args
        .keys()
        .filter(|k| contract.param(k).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        unknown.sort();
        return Err(invalid(
            contract,
            "invalid_arguments",
            format!("unknown parameter(s) for tool '{}': {}", contract.name, unknown.join(", ")),
        ));
    }

    let missing: Vec<&str> = contract
        .params
        .iter()
        .filter(|p| p.required && !args.contains_key(p.name))
        .map(|p| p.name)
        .collect();
    if !missing.is_empty() {
        return Err(invalid(
            contract,
            "missing_parameter",
            format!("missing required parameter(s) for tool '{}': {}", contract.name, missing.join(", ")),
        ));
    }

    for param in &contract.params {
        if let Some(value) = args.get(param.name)
            && !param.ty.accepts(value)
        {
            return Err(invalid(
                contract,
                "invalid_arguments",
                format!(
                    "invalid type for parameter '{}' on tool '{}': expected {}",
                    param.name, contract.name, param.ty
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ErrorKind, ParamSpec, ParamType, ToolKind};
    use serde_json::json;

    fn write_contract() -> ToolContract {
        ToolContract {
            name: "write",
            description: "Write a file",
            aliases: &[],
            params: vec![
                ParamSpec::required("path", ParamType::String, "File path").aliases(&["file_path", "filename"]),
                ParamSpec::required("content", ParamType::String, "Content").aliases(&["contents", "text"]),
                ParamSpec::optional("limit", ParamType::Integer, "Limit"),
            ],
            kind: ToolKind::Mutating,
            example: r#"{"path": "a.txt", "content": "hello"}"#,
        }
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("filePath"), "file_path");
        assert_eq!(normalize_key("file-path"), "file_path");
        assert_eq!(normalize_key("PATH"), "path");
        assert_eq!(normalize_key("old_string"), "old_string");
        assert_eq!(normalize_key("lineStart2"), "line_start2");
    }

    #[test]
    fn test_remap_aliases() {
        let (args, repairs) = remap_aliases(obj(json!({"filePath": "a", "contents": "x"})), &write_contract());
        assert_eq!(args, obj(json!({"path": "a", "content": "x"})));
        assert_eq!(repairs.len(), 2);
    }

    #[test]
    fn test_canonical_wins_over_alias() {
        let (args, _) = remap_aliases(obj(json!({"file_path": "alias", "path": "canonical", "content": ""})), &write_contract());
        assert_eq!(args["path"], json!("canonical"));
        assert!(!args.contains_key("file_path"));
    }

    #[test]
    fn test_unknown_parameter_lists_accepted() {
        let err = validate_arguments(&obj(json!({"path": "a", "content": "x", "mode": "w"})), &write_contract()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        let msg = err.to_string();
        assert!(msg.contains("unknown parameter(s) for tool 'write': mode"));
        assert!(msg.contains("path (string, required)"));
        assert!(msg.contains(r#"write({"path": "a.txt", "content": "hello"})"#));
    }

    #[test]
    fn test_missing_and_type_errors() {
        let err = validate_arguments(&obj(json!({"path": "a"})), &write_contract()).unwrap_err();
        assert!(err.to_string().contains("missing required parameter(s) for tool 'write': content"));
        assert_eq!(err.code(), "missing_parameter");

        let err = validate_arguments(&obj(json!({"path": "a", "content": "x", "limit": "many"})), &write_contract()).unwrap_err();
        assert!(err.to_string().contains("invalid type for parameter 'limit'"));
        assert_eq!(err.code(), "invalid_arguments");
    }

    #[test]
    fn test_coerce_arguments() {
        let mut args = obj(json!({"path": "a", "content": 5, "limit": "ten"}));
        let repairs = coerce_arguments(&mut args, &write_contract());
        assert_eq!(args, obj(json!({"path": "a", "content": "5", "limit": 10})));
        assert_eq!(repairs.len(), 2);
        assert!(validate_arguments(&args, &write_contract()).is_ok());
    }

    #[test]
    fn test_null_optional_dropped() {
        let mut args = obj(json!({"path": "a", "content": "x", "limit": null}));
        coerce_arguments(&mut args, &write_contract());
        assert!(!args.contains_key("limit"));
    }
}
