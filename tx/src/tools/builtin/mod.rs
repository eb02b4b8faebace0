//! Built-in tools

mod apply_patch;
mod batch_read;
mod edit_file;
mod glob;
mod grep;
mod list_directory;
mod read_file;
mod shell;
mod write_file;

pub use apply_patch::ApplyPatchTool;
pub use batch_read::BatchReadTool;
pub use edit_file::EditFileTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::{ReadFileTool, ReadRequest, read_file};
pub use shell::ShellTool;
pub use write_file::WriteFileTool;

use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::ToolError;

/// Note appended when a listing hits the search cap
pub(crate) const TRUNCATED_NOTE: &str = "(results are truncated; refine path or pattern)";

pub(crate) fn arg_str<'a>(input: &'a Value, name: &str) -> Option<&'a str> {
    input.get(name).and_then(Value::as_str)
}

pub(crate) fn arg_i64(input: &Value, name: &str) -> Option<i64> {
    input.get(name).and_then(Value::as_i64)
}

pub(crate) fn arg_bool(input: &Value, name: &str) -> bool {
    input.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// Required string argument; the normalizer has already checked presence
pub(crate) fn require_str<'a>(input: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    arg_str(input, name)
        .ok_or_else(|| ToolError::validation("missing_parameter", format!("missing required parameter: {}", name)))
}

/// `   1| text` numbering used by read and by recovery payloads
pub(crate) fn number_lines<'a>(lines: impl IntoIterator<Item = &'a str>, first: usize, max_len: usize) -> String {
    let mut out = String::new();
    for (idx, line) in lines.into_iter().enumerate() {
        let shown: String = if line.chars().count() > max_len {
            let cut: String = line.chars().take(max_len).collect();
            format!("{}... (line truncated)", cut)
        } else {
            line.to_string()
        };
        out.push_str(&format!("{:4}| {}\n", first + idx, shown));
    }
    out
}

/// Full numbered content of a file, as attached to recovery errors
pub(crate) fn numbered_content(content: &str) -> String {
    number_lines(content.lines(), 1, usize::MAX)
}

/// Inserted and deleted line counts between two texts
pub(crate) fn line_delta(before: &str, after: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(before, after);
    let mut added = 0;
    let mut removed = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, removed)
}

/// Write through a sibling temp file and rename, so readers never see a partial file
pub(crate) async fn write_atomic(path: &Path, content: &str) -> Result<(), ToolError> {
    debug!(?path, len = content.len(), "write_atomic: called");
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::io(format!("failed to create {}", parent.display()), e))?;
    }
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tx-{}", name, Uuid::now_v7().simple()));

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ToolError::io(format!("failed to write {}", path.display()), e));
    }
    // keep the original permissions on overwrite
    if let Ok(meta) = tokio::fs::metadata(path).await {
        let _ = tokio::fs::set_permissions(&tmp, meta.permissions()).await;
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ToolError::io(format!("failed to replace {}", path.display()), e));
    }
    Ok(())
}

/// Detect CRLF content; returns the LF-normalized text when it applies
pub(crate) fn split_line_endings(content: &str) -> (String, bool) {
    if content.contains("\r\n") {
        (content.replace("\r\n", "\n"), true)
    } else {
        (content.to_string(), false)
    }
}

pub(crate) fn restore_line_endings(content: String, crlf: bool) -> String {
    if crlf { content.replace('\n', "\r\n") } else { content }
}
