//! read tool - windowed, line-numbered file reads with a diff mode

use async_trait::async_trait;
use serde_json::Value;
use similar::TextDiff;
use tracing::debug;

use crate::tools::{ParamSpec, ParamType, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult};

use super::{arg_bool, arg_i64, number_lines, require_str};

/// Bytes sniffed for NUL when classifying binary files
const BINARY_SNIFF_LEN: usize = 8192;

/// A single read, shared by `read` and `batch_read`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRequest {
    pub path: String,
    /// 0-based count of lines to skip
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    /// 1-based inclusive range
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub diff: bool,
}

impl ReadRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    fn from_input(input: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            path: require_str(input, "path")?.to_string(),
            offset: arg_i64(input, "offset"),
            limit: arg_i64(input, "limit"),
            line_start: arg_i64(input, "line_start"),
            line_end: arg_i64(input, "line_end"),
            diff: arg_bool(input, "diff"),
        })
    }

    fn has_window(&self) -> bool {
        self.offset.is_some() || self.limit.is_some() || self.line_start.is_some() || self.line_end.is_some()
    }

    fn has_range(&self) -> bool {
        self.line_start.is_some() || self.line_end.is_some()
    }
}

/// Rendered output of a successful read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutput {
    pub text: String,
    /// `read`, `end_of_file`, `empty`, `diff` or `unchanged`
    pub code: &'static str,
    pub relative: String,
}

/// Lines to skip and lines to show
fn window(req: &ReadRequest, default_limit: usize) -> Result<(usize, usize), ToolError> {
    let limit = match req.limit {
        Some(n) if n < 1 => {
            return Err(ToolError::validation("invalid_limit", format!("limit must be >= 1, got {}", n)));
        }
        Some(n) => n as usize,
        None => default_limit,
    };

    if req.has_range() {
        let start = req.line_start.unwrap_or(1);
        if start < 1 {
            return Err(ToolError::validation(
                "invalid_line_range",
                format!("line_start must be >= 1, got {}", start),
            ));
        }
        if let Some(end) = req.line_end {
            if end < start {
                return Err(ToolError::validation(
                    "invalid_line_range",
                    format!("line_end ({}) must be >= line_start ({})", end, start),
                ));
            }
            let span = (end - start + 1) as usize;
            return Ok(((start - 1) as usize, span.min(limit)));
        }
        return Ok(((start - 1) as usize, limit));
    }

    match req.offset {
        Some(n) if n < 0 => Err(ToolError::validation(
            "invalid_offset",
            format!("offset must be >= 0 (lines to skip), got {}", n),
        )),
        Some(n) => Ok((n as usize, limit)),
        None => Ok((0, limit)),
    }
}

/// Read one file inside the sandbox and record what was seen
pub async fn read_file(ctx: &ToolContext, req: &ReadRequest) -> Result<ReadOutput, ToolError> {
    debug!(?req, "read_file: called");
    if req.diff && req.has_range() {
        return Err(ToolError::validation(
            "invalid_arguments",
            "diff cannot be combined with line_start or line_end",
        ));
    }
    let limits = &ctx.config().limits;
    let (skip, take) = window(req, limits.default_read_limit)?;

    let resolved = ctx.resolve(&req.path, true)?;
    let relative = resolved.relative.clone();

    let meta = tokio::fs::metadata(&resolved.path)
        .await
        .map_err(|e| ToolError::io(format!("failed to stat {}", relative), e))?;
    if meta.is_dir() {
        return Err(ToolError::validation(
            "is_directory",
            format!("{} is a directory, not a file. Use ls to list it or glob to find files in it.", relative),
        ));
    }
    if meta.len() > limits.max_file_size && !req.has_window() {
        return Err(ToolError::validation(
            "file_too_large",
            format!(
                "{} is {} bytes (limit {}). Read a window with offset and limit, or line_start and line_end.",
                relative,
                meta.len(),
                limits.max_file_size
            ),
        ));
    }

    let bytes = tokio::fs::read(&resolved.path)
        .await
        .map_err(|e| ToolError::io(format!("failed to read {}", relative), e))?;
    if bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0) {
        return Err(ToolError::validation(
            "binary_file",
            format!("{} appears to be a binary file and cannot be shown as text", relative),
        ));
    }
    let content = String::from_utf8_lossy(&bytes).into_owned();

    let mut prefix = String::new();
    if let Some(original) = &resolved.corrected_from {
        prefix.push_str(&format!("(note: {} not found; showing {})\n", original, relative));
    }

    let mut session = ctx.session().await;
    let previous = session.version(&resolved.path).map(|v| v.content.clone());
    session.record_version(&resolved.path, &content);
    drop(session);

    if req.diff {
        match previous {
            Some(prior) if prior == content => {
                let lines = content.lines().count();
                return Ok(ReadOutput {
                    text: format!("{}No changes in {} since last read ({} lines).", prefix, relative, lines),
                    code: "unchanged",
                    relative,
                });
            }
            Some(prior) => {
                let diff = TextDiff::from_lines(&prior, &content)
                    .unified_diff()
                    .context_radius(3)
                    .header(&relative, &relative)
                    .to_string();
                return Ok(ReadOutput {
                    text: format!("{}{}", prefix, diff),
                    code: "diff",
                    relative,
                });
            }
            None => {
                prefix.push_str(&format!("(no previous read of {}; showing full content)\n", relative));
            }
        }
    }

    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    if total == 0 {
        return Ok(ReadOutput {
            text: format!("{}{} is empty (0 lines).", prefix, relative),
            code: "empty",
            relative,
        });
    }
    if skip >= total {
        return Ok(ReadOutput {
            text: format!("{}File already fully read ({} lines). No more content.", prefix, total),
            code: "end_of_file",
            relative,
        });
    }

    let shown: Vec<&str> = lines.iter().skip(skip).take(take).copied().collect();
    let mut text = prefix;
    text.push_str(&number_lines(shown.iter().copied(), skip + 1, limits.max_line_length));

    let next = skip + shown.len();
    if next < total {
        text.push_str(&format!(
            "\n(... {} more lines, use offset={} to continue)",
            total - next,
            next
        ));
    }
    Ok(ReadOutput {
        text: text.trim_end().to_string(),
        code: "read",
        relative,
    })
}

/// Read a file's contents with line numbers
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "read",
            description: "Read a file with line numbers. Use offset/limit or line_start/line_end for a window, diff=true to see changes since your last read.",
            aliases: &["read_file", "cat", "view", "view_file", "open", "open_file"],
            params: vec![
                ParamSpec::required("path", ParamType::String, "File path relative to the sandbox root")
                    .aliases(&["file_path", "filepath", "file", "filename"]),
                ParamSpec::optional("offset", ParamType::Integer, "Lines to skip before reading (0-based)")
                    .aliases(&["skip"]),
                ParamSpec::optional("limit", ParamType::Integer, "Max lines to read (default: 2000)")
                    .aliases(&["max_lines", "lines", "count"]),
                ParamSpec::optional("line_start", ParamType::Integer, "First line to show (1-based)")
                    .aliases(&["start_line", "start", "from_line"]),
                ParamSpec::optional("line_end", ParamType::Integer, "Last line to show (1-based, inclusive)")
                    .aliases(&["end_line", "end", "to_line"]),
                ParamSpec::optional("diff", ParamType::Boolean, "Show a unified diff against the last read")
                    .aliases(&["show_diff"]),
            ],
            kind: ToolKind::ReadOnly,
            example: r#"{"path": "src/main.rs", "offset": 0, "limit": 200}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ReadFileTool::execute: called");
        let req = match ReadRequest::from_input(&input) {
            Ok(req) => req,
            Err(e) => return ToolResult::error(e),
        };
        match read_file(ctx, &req).await {
            Ok(out) => ToolResult::success(out.text).with_code(out.code).with_path(out.relative),
            Err(e) => {
                debug!(%e, "ReadFileTool::execute: failed");
                ToolResult::error(e).with_path(req.path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tools::ErrorKind;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn context(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root, Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_read_file_basic() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "line 1\nline 2\nline 3").unwrap();
        let ctx = context(temp.path());

        let result = ReadFileTool.execute(json!({"path": "test.txt"}), &ctx).await;

        assert!(!result.is_error);
        assert_eq!(result.text, "   1| line 1\n   2| line 2\n   3| line 3");
        assert_eq!(result.path.as_deref(), Some("test.txt"));
    }

    #[tokio::test]
    async fn test_read_file_with_offset_and_limit() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "l1\nl2\nl3\nl4\nl5\n").unwrap();
        let ctx = context(temp.path());

        let result = ReadFileTool
            .execute(json!({"path": "test.txt", "offset": 1, "limit": 2}), &ctx)
            .await;

        assert!(!result.is_error);
        assert!(!result.text.contains("| l1"));
        assert!(result.text.contains("   2| l2"));
        assert!(result.text.contains("   3| l3"));
        assert!(result.text.contains("(... 2 more lines, use offset=3 to continue)"));
    }

    #[tokio::test]
    async fn test_read_line_range() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "a\nb\nc\nd\n").unwrap();
        let ctx = context(temp.path());

        let result = ReadFileTool
            .execute(json!({"path": "test.txt", "line_start": 2, "line_end": 3}), &ctx)
            .await;
        assert_eq!(result.text, "   2| b\n   3| c\n\n(... 1 more lines, use offset=3 to continue)");

        let bad = ReadFileTool
            .execute(json!({"path": "test.txt", "line_start": 3, "line_end": 1}), &ctx)
            .await;
        assert!(bad.is_error);
        assert_eq!(bad.code.as_deref(), Some("invalid_line_range"));
    }

    #[tokio::test]
    async fn test_read_past_end_is_not_an_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "a\nb\n").unwrap();
        let ctx = context(temp.path());

        let result = ReadFileTool.execute(json!({"path": "test.txt", "offset": 2}), &ctx).await;
        assert!(!result.is_error);
        assert_eq!(result.code.as_deref(), Some("end_of_file"));
        assert_eq!(result.text, "File already fully read (2 lines). No more content.");
    }

    #[tokio::test]
    async fn test_read_records_version() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "hello\n").unwrap();
        let ctx = context(temp.path());

        ReadFileTool.execute(json!({"path": "test.txt"}), &ctx).await;
        let path = ctx.root().join("test.txt");
        let session = ctx.session().await;
        assert_eq!(session.version(&path).unwrap().content, "hello\n");
        assert!(session.was_seen(&path));
    }

    #[tokio::test]
    async fn test_read_diff_mode() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "a\nb\n").unwrap();
        let ctx = context(temp.path());

        let first = ReadFileTool.execute(json!({"path": "test.txt", "diff": true}), &ctx).await;
        assert!(first.text.contains("no previous read"));
        assert!(first.text.contains("   1| a"));

        let same = ReadFileTool.execute(json!({"path": "test.txt", "diff": true}), &ctx).await;
        assert_eq!(same.code.as_deref(), Some("unchanged"));

        fs::write(temp.path().join("test.txt"), "a\nc\n").unwrap();
        let changed = ReadFileTool.execute(json!({"path": "test.txt", "diff": true}), &ctx).await;
        assert_eq!(changed.code.as_deref(), Some("diff"));
        assert!(changed.text.contains("-b"));
        assert!(changed.text.contains("+c"));

        let invalid = ReadFileTool
            .execute(json!({"path": "test.txt", "diff": true, "line_start": 1}), &ctx)
            .await;
        assert!(invalid.is_error);
    }

    #[tokio::test]
    async fn test_read_missing_and_directory() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let ctx = context(temp.path());

        let missing = ReadFileTool.execute(json!({"path": "nope.txt"}), &ctx).await;
        assert!(missing.is_error);
        assert_eq!(missing.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(missing.code.as_deref(), Some("file_not_found"));
        assert_eq!(missing.path.as_deref(), Some("nope.txt"));

        let dir = ReadFileTool.execute(json!({"path": "sub"}), &ctx).await;
        assert!(dir.is_error);
        assert_eq!(dir.code.as_deref(), Some("is_directory"));
    }

    #[tokio::test]
    async fn test_read_autocorrects_unique_basename() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/deep")).unwrap();
        fs::write(temp.path().join("src/deep/lib.rs"), "fn x() {}\n").unwrap();
        let ctx = context(temp.path());

        let result = ReadFileTool.execute(json!({"path": "lib.rs"}), &ctx).await;
        assert!(!result.is_error);
        assert!(result.text.starts_with("(note: lib.rs not found; showing src/deep/lib.rs)"));
        assert_eq!(result.path.as_deref(), Some("src/deep/lib.rs"));
    }

    #[tokio::test]
    async fn test_read_binary_and_large() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("blob.bin"), [0u8, 1, 2, 3]).unwrap();
        let mut config = Config::default();
        config.limits.max_file_size = 10;
        let ctx = ToolContext::new(temp.path(), config).unwrap();

        let binary = ReadFileTool.execute(json!({"path": "blob.bin"}), &ctx).await;
        assert_eq!(binary.code.as_deref(), Some("binary_file"));

        fs::write(temp.path().join("big.txt"), "0123456789\nabcdef\n").unwrap();
        let big = ReadFileTool.execute(json!({"path": "big.txt"}), &ctx).await;
        assert_eq!(big.code.as_deref(), Some("file_too_large"));

        let windowed = ReadFileTool.execute(json!({"path": "big.txt", "limit": 1}), &ctx).await;
        assert!(!windowed.is_error);
        assert!(windowed.text.contains("0123456789"));
    }
}
