//! Tool-name cleaning and resolution

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::tools::{ContractTable, ToolContract, ToolError};

/// Chat-format control tokens such as `<|channel|>`
static CONTROL_TOKEN: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"<\|[^|]*\|>") {
    Ok(regex) => regex,
    Err(err) => panic!("control token regex is invalid: {err}"),
});

/// Reduce a raw model-supplied tool name to its lookup key
pub fn clean_tool_name(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or_default();
    let mut name = CONTROL_TOKEN.replace_all(first_line, " ").into_owned();
    if let Some(pos) = name.find("<|") {
        name.truncate(pos);
    }
    // Keep the first word left after removing tokens
    let name = name.split_whitespace().next().unwrap_or_default();
    let name = name.trim_matches(|c: char| c == '"' || c == '\'' || c == '`');
    let name = name.strip_prefix("functions.").unwrap_or(name);
    name.to_lowercase()
}

/// Resolve a raw name to a registered contract
pub fn resolve_tool<'a>(raw: &str, table: &'a ContractTable) -> Result<&'a ToolContract, ToolError> {
    let cleaned = clean_tool_name(raw);
    debug!(%raw, %cleaned, "resolve_tool: called");
    if cleaned.is_empty() {
        return Err(ToolError::MissingToolName);
    }
    table.lookup(&cleaned).ok_or_else(|| ToolError::UnknownTool {
        name: raw.trim().lines().next().unwrap_or_default().to_string(),
        available: table.names().join(", "),
    })
}
