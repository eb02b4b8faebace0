//! Staged JSON repair for model-produced argument payloads

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

use super::coerce::parse_number_words;

/// Bare word values after a key, e.g. `"limit": ten`
static BARE_WORD_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r#""([A-Za-z_][A-Za-z0-9_]*)"\s*:\s*([A-Za-z][A-Za-z -]*[A-Za-z]|[A-Za-z])\s*([,}\]])"#) {
        Ok(regex) => regex,
        Err(err) => panic!("bare word regex is invalid: {err}"),
    }
});

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("invalid JSON in tool arguments: {reason}. Raw: {preview}")]
    InvalidJson { reason: String, preview: String },

    #[error("invalid arguments: expected a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}

/// One fix applied while normalizing a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Repair {
    StripFences,
    TrailingCommas,
    NormalizeQuotes,
    BalanceDelimiters,
    QuoteNumberWords,
    DoubleEncoded,
    ExtractPatchBlock,
    Alias { from: String, to: String },
    Coerced { param: String },
    DroppedNull { param: String },
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StripFences => write!(f, "strip_fences"),
            Self::TrailingCommas => write!(f, "trailing_commas"),
            Self::NormalizeQuotes => write!(f, "normalize_quotes"),
            Self::BalanceDelimiters => write!(f, "balance_delimiters"),
            Self::QuoteNumberWords => write!(f, "quote_number_words"),
            Self::DoubleEncoded => write!(f, "double_encoded"),
            Self::ExtractPatchBlock => write!(f, "extract_patch_block"),
            Self::Alias { from, to } => write!(f, "alias {} -> {}", from, to),
            Self::Coerced { param } => write!(f, "coerced {}", param),
            Self::DroppedNull { param } => write!(f, "dropped null {}", param),
        }
    }
}

/// Text-level repair stages, cheapest first
const STAGES: [Repair; 5] = [
    Repair::StripFences,
    Repair::TrailingCommas,
    Repair::NormalizeQuotes,
    Repair::BalanceDelimiters,
    Repair::QuoteNumberWords,
];

fn apply_stage(stage: &Repair, text: &str) -> String {
    match stage {
        Repair::StripFences => strip_fences(text),
        Repair::TrailingCommas => strip_trailing_commas(text),
        Repair::NormalizeQuotes => normalize_quotes(text),
        Repair::BalanceDelimiters => balance_delimiters(text),
        Repair::QuoteNumberWords => repair_number_words(text),
        _ => text.to_string(),
    }
}

/// Parse raw arguments into an object, repairing the text when needed.
///
/// Each stage is first tried alone against the original text so the smallest
/// fix wins; only then are the stages stacked in order.
pub fn parse_arguments(raw: &Value, tool: &str) -> Result<(Map<String, Value>, Vec<Repair>), RepairError> {
    match raw {
        Value::Null => Ok((Map::new(), Vec::new())),
        Value::Object(map) => Ok((map.clone(), Vec::new())),
        Value::String(text) => parse_text(text, tool),
        other => Err(RepairError::NotAnObject {
            found: json_type_name(other),
        }),
    }
}

fn parse_text(text: &str, tool: &str) -> Result<(Map<String, Value>, Vec<Repair>), RepairError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok((Map::new(), Vec::new()));
    }

    let first_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return into_object(value, Vec::new()),
        Err(e) => e,
    };
    debug!(%tool, error = %first_error, "parse_arguments: first parse failed, repairing");

    for stage in &STAGES {
        let fixed = apply_stage(stage, trimmed);
        if fixed != trimmed
            && let Ok(value) = serde_json::from_str::<Value>(&fixed)
        {
            debug!(%stage, "parse_arguments: single stage repaired");
            return into_object(value, vec![stage.clone()]);
        }
    }

    let mut current = trimmed.to_string();
    let mut applied = Vec::new();
    for stage in &STAGES {
        let next = apply_stage(stage, &current);
        if next != current {
            current = next;
            applied.push(stage.clone());
            if let Ok(value) = serde_json::from_str::<Value>(&current) {
                debug!(?applied, "parse_arguments: stacked stages repaired");
                return into_object(value, applied);
            }
        }
    }

    if tool == "apply_patch"
        && let Some(patch) = extract_patch_block(trimmed)
    {
        debug!("parse_arguments: recovered patch block from raw text");
        let mut map = Map::new();
        map.insert("patch".to_string(), Value::String(patch));
        return Ok((map, vec![Repair::ExtractPatchBlock]));
    }

    Err(RepairError::InvalidJson {
        reason: first_error.to_string(),
        preview: trimmed.chars().take(100).collect(),
    })
}

fn into_object(value: Value, mut repairs: Vec<Repair>) -> Result<(Map<String, Value>, Vec<Repair>), RepairError> {
    match value {
        Value::Object(map) => Ok((map, repairs)),
        Value::Null => Ok((Map::new(), repairs)),
        Value::String(inner) => match serde_json::from_str::<Value>(inner.trim()) {
            Ok(Value::Object(map)) => {
                repairs.push(Repair::DoubleEncoded);
                Ok((map, repairs))
            }
            _ => Err(RepairError::NotAnObject { found: "string" }),
        },
        other => Err(RepairError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Pull a `*** Begin Patch` .. `*** End Patch` block out of free text
pub fn extract_patch_block(text: &str) -> Option<String> {
    let start = text.find("*** Begin Patch")?;
    let end_marker = "*** End Patch";
    let end = text[start..].find(end_marker)? + start + end_marker.len();
    let block = &text[start..end];
    // JSON-escaped newlines from a half-formed payload
    if !block.contains('\n') && block.contains("\\n") {
        return Some(block.replace("\\n", "\n").replace("\\\"", "\""));
    }
    Some(block.to_string())
}

fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return text.to_string();
    }
    let body = trimmed.split_once('\n').map(|(_, rest)| rest).unwrap_or_default();
    body.trim_end().trim_end_matches("```").trim().to_string()
}

/// Drop commas that directly precede a closing brace or bracket
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Smart quotes to ASCII, then single-quoted strings to double-quoted
fn normalize_quotes(text: &str) -> String {
    let ascii: String = text
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            other => other,
        })
        .collect();

    let mut out = String::with_capacity(ascii.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in ascii.chars() {
        match quote {
            None => match ch {
                '"' => {
                    quote = Some('"');
                    out.push('"');
                }
                '\'' => {
                    quote = Some('\'');
                    out.push('"');
                }
                _ => out.push(ch),
            },
            Some(q) => {
                if escaped {
                    escaped = false;
                    if q == '\'' && ch == '\'' {
                        // \' needs no escape inside a double-quoted string
                        out.pop();
                    }
                    out.push(ch);
                } else if ch == '\\' {
                    escaped = true;
                    out.push(ch);
                } else if ch == q {
                    quote = None;
                    out.push('"');
                } else if q == '\'' && ch == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push(ch);
                }
            }
        }
    }
    out
}

/// Close an unterminated string and any unclosed braces or brackets
fn balance_delimiters(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '{' => {
                stack.push('}');
                out.push(ch);
            }
            '[' => {
                stack.push(']');
                out.push(ch);
            }
            '}' | ']' => {
                // Drop stray closers with nothing open
                if stack.last() == Some(&ch) {
                    stack.pop();
                    out.push(ch);
                } else if let Some(pos) = stack.iter().rposition(|c| *c == ch) {
                    while stack.len() > pos + 1 {
                        if let Some(closer) = stack.pop() {
                            out.push(closer);
                        }
                    }
                    stack.pop();
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    if !stack.is_empty() {
        let keep = out.trim_end().len();
        out.truncate(keep);
        if out.ends_with(',') {
            out.pop();
        }
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Replace bare number words with digits: `"limit": ten` -> `"limit": 10`
fn repair_number_words(text: &str) -> String {
    BARE_WORD_VALUE
        .replace_all(text, |caps: &Captures| match parse_number_words(&caps[2]) {
            Some(n) => format!("\"{}\": {}{}", &caps[1], n, &caps[3]),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> (Map<String, Value>, Vec<Repair>) {
        parse_arguments(&Value::String(text.to_string()), "write").unwrap()
    }

    #[test]
    fn test_valid_json_needs_no_repair() {
        let (map, repairs) = parse(r#"{"path": "a.txt"}"#);
        assert_eq!(map["path"], json!("a.txt"));
        assert!(repairs.is_empty());
    }

    #[test]
    fn test_trailing_comma_matches_clean_parse() {
        let (clean, _) = parse(r#"{"path": "a.txt", "content": "x"}"#);
        let (repaired, repairs) = parse(r#"{"path": "a.txt", "content": "x",}"#);
        assert_eq!(clean, repaired);
        assert_eq!(repairs, vec![Repair::TrailingCommas]);
    }

    #[test]
    fn test_trailing_comma_inside_string_is_kept() {
        assert_eq!(strip_trailing_commas(r#"{"a": "x,}", }"#), r#"{"a": "x,}" }"#);
    }

    #[test]
    fn test_single_and_smart_quotes() {
        let (map, repairs) = parse("{'path': 'a.txt', 'content': 'say \"hi\"'}");
        assert_eq!(map["path"], json!("a.txt"));
        assert_eq!(map["content"], json!("say \"hi\""));
        assert_eq!(repairs, vec![Repair::NormalizeQuotes]);

        let (map, _) = parse("{\u{201C}path\u{201D}: \u{201C}b.txt\u{201D}}");
        assert_eq!(map["path"], json!("b.txt"));
    }

    #[test]
    fn test_apostrophe_in_double_quoted_string_untouched() {
        assert_eq!(normalize_quotes(r#"{"a": "it's"}"#), r#"{"a": "it's"}"#);
    }

    #[test]
    fn test_balance_unclosed() {
        let (map, repairs) = parse(r#"{"path": "a.txt", "content": "x"#);
        assert_eq!(map["content"], json!("x"));
        assert_eq!(repairs, vec![Repair::BalanceDelimiters]);

        assert_eq!(balance_delimiters(r#"{"a": [1, 2"#), r#"{"a": [1, 2]}"#);
        assert_eq!(balance_delimiters(r#"{"a": 1}}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_stacked_repairs() {
        let (map, repairs) = parse("{'path': 'a.txt', 'content': 'x',");
        assert_eq!(map["path"], json!("a.txt"));
        assert_eq!(map["content"], json!("x"));
        assert!(repairs.contains(&Repair::NormalizeQuotes));
        assert!(repairs.contains(&Repair::BalanceDelimiters));
    }

    #[test]
    fn test_number_words() {
        let (map, repairs) = parse(r#"{"path": "a.txt", "limit": twenty five}"#);
        assert_eq!(map["limit"], json!(25));
        assert_eq!(repairs, vec![Repair::QuoteNumberWords]);
    }

    #[test]
    fn test_fenced_payload() {
        let (map, repairs) = parse("```json\n{\"path\": \"a.txt\"}\n```");
        assert_eq!(map["path"], json!("a.txt"));
        assert_eq!(repairs, vec![Repair::StripFences]);
    }

    #[test]
    fn test_double_encoded() {
        let raw = Value::String(r#""{\"path\": \"a.txt\"}""#.to_string());
        let (map, repairs) = parse_arguments(&raw, "read").unwrap();
        assert_eq!(map["path"], json!("a.txt"));
        assert_eq!(repairs, vec![Repair::DoubleEncoded]);
    }

    #[test]
    fn test_patch_block_recovery() {
        let raw = "apply this:\n*** Begin Patch\n*** Delete File: a.txt\n*** End Patch\nthanks";
        let (map, repairs) = parse_arguments(&Value::String(raw.to_string()), "apply_patch").unwrap();
        assert_eq!(map["patch"], json!("*** Begin Patch\n*** Delete File: a.txt\n*** End Patch"));
        assert_eq!(repairs, vec![Repair::ExtractPatchBlock]);
    }

    #[test]
    fn test_unrepairable_reports_preview() {
        let err = parse_arguments(&Value::String("not json at all".to_string()), "read").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid JSON"));
        assert!(msg.contains("not json at all"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            parse_arguments(&json!([1, 2]), "read"),
            Err(RepairError::NotAnObject { found: "array" })
        ));
        assert!(parse_arguments(&Value::String(String::new()), "read").unwrap().0.is_empty());
        assert!(parse_arguments(&Value::Null, "read").unwrap().0.is_empty());
    }
}
