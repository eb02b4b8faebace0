//! write tool - create or overwrite a whole file

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::session::OpKind;
use crate::tools::{NoopLevel, ParamSpec, ParamType, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult};

use super::{line_delta, numbered_content, require_str, write_atomic};

/// Write full content to a file
pub struct WriteFileTool;

impl WriteFileTool {
    async fn run(&self, input: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let path = require_str(input, "path")?;
        let content = input.get("content").and_then(Value::as_str).ok_or_else(|| {
            ToolError::validation(
                "missing_content",
                format!("write to {} needs content: pass the complete file text in content", path),
            )
        })?;

        let resolved = ctx.resolve(path, false)?;
        ctx.guard_test_file(&resolved)?;
        if resolved.path.is_dir() {
            return Err(ToolError::validation(
                "is_directory",
                format!("{} is a directory; write needs a file path", resolved.relative),
            ));
        }

        let existing = match tokio::fs::read(&resolved.path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(ToolError::io(format!("failed to read {}", resolved.relative), e)),
        };

        if existing.as_deref() == Some(content.as_bytes()) {
            let level = ctx.session().await.record_noop(&resolved.path, OpKind::Write);
            debug!(path = %resolved.relative, ?level, "WriteFileTool::run: no-op");
            let text = match level {
                NoopLevel::First => format!(
                    "ok: no changes: {} already has exactly this content ({} lines), so nothing was written. \
                     If you meant to change it, modify the content first. Current content:\n{}",
                    resolved.relative,
                    content.lines().count(),
                    numbered_content(content)
                ),
                NoopLevel::Repeated => "ok: no changes".to_string(),
            };
            return Ok(ToolResult::noop(text.trim_end(), level).with_path(resolved.relative));
        }

        write_atomic(&resolved.path, content).await?;
        ctx.session().await.record_mutation(&resolved.path);

        let result = match existing {
            None => ToolResult::success(format!("Created {} (+{} lines)", resolved.relative, content.lines().count()))
                .with_code("created"),
            Some(bytes) => {
                let before = String::from_utf8_lossy(&bytes);
                let (added, removed) = line_delta(&before, content);
                ToolResult::success(format!("Updated {} (+{} -{} lines)", resolved.relative, added, removed))
                    .with_code("overwritten")
            }
        };
        Ok(result.with_path(resolved.relative))
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "write",
            description: "Create a file or replace its entire content. Parent directories are created as needed.",
            aliases: &["write_file", "create_file", "create", "save", "save_file"],
            params: vec![
                ParamSpec::required("path", ParamType::String, "File path relative to the sandbox root")
                    .aliases(&["file_path", "filepath", "file", "filename"]),
                ParamSpec::required("content", ParamType::String, "Complete file content")
                    .aliases(&["contents", "text", "data", "file_content", "body"]),
            ],
            kind: ToolKind::Mutating,
            example: r#"{"path": "notes.txt", "content": "hello\n"}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "WriteFileTool::execute: called");
        match self.run(&input, ctx).await {
            Ok(result) => result,
            Err(e) => {
                debug!(%e, "WriteFileTool::execute: failed");
                ctx.session().await.record_failed_mutation();
                let path = input.get("path").and_then(Value::as_str).unwrap_or_default().to_string();
                ToolResult::error(e).with_path(path)
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
    async fn test_write_creates_file_and_parents() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let result = WriteFileTool
            .execute(json!({"path": "src/nested/new.txt", "content": "a\nb\n"}), &ctx)
            .await;

        assert!(!result.is_error);
        assert_eq!(result.code.as_deref(), Some("created"));
        assert_eq!(result.text, "Created src/nested/new.txt (+2 lines)");
        assert_eq!(fs::read_to_string(temp.path().join("src/nested/new.txt")).unwrap(), "a\nb\n");
    }

    #[tokio::test]
    async fn test_write_overwrite_reports_delta() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("f.txt"), "a\nb\n").unwrap();
        let ctx = context(temp.path());

        let result = WriteFileTool.execute(json!({"path": "f.txt", "content": "a\nc\nd\n"}), &ctx).await;
        assert_eq!(result.code.as_deref(), Some("overwritten"));
        assert_eq!(result.text, "Updated f.txt (+2 -1 lines)");
    }

    #[tokio::test]
    async fn test_write_noop_escalates() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("f.txt"), "same\n").unwrap();
        let ctx = context(temp.path());
        let input = json!({"path": "f.txt", "content": "same\n"});

        let first = WriteFileTool.execute(input.clone(), &ctx).await;
        assert!(!first.is_error);
        assert_eq!(first.noop, Some(NoopLevel::First));
        assert!(first.text.starts_with("ok: no changes: f.txt already has exactly this content"));
        assert!(first.text.contains("   1| same"));

        let second = WriteFileTool.execute(input, &ctx).await;
        assert_eq!(second.noop, Some(NoopLevel::Repeated));
        assert_eq!(second.text, "ok: no changes");
    }

    #[tokio::test]
    async fn test_write_escape_rejected() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let result = WriteFileTool.execute(json!({"path": "../evil.txt", "content": "x"}), &ctx).await;
        assert!(result.is_error);
        assert_eq!(result.error_kind, Some(ErrorKind::SandboxViolation));
        assert!(!temp.path().parent().unwrap().join("evil.txt").exists());
    }

    #[tokio::test]
    async fn test_write_protects_test_files() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let result = WriteFileTool.execute(json!({"path": "test_api.py", "content": "x"}), &ctx).await;
        assert!(result.is_error);
        assert_eq!(result.code.as_deref(), Some("test_file_protected"));
        assert!(!temp.path().join("test_api.py").exists());
    }

    #[tokio::test]
    async fn test_write_missing_content() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let result = WriteFileTool.execute(json!({"path": "a.txt"}), &ctx).await;
        assert!(result.is_error);
        assert_eq!(result.code.as_deref(), Some("missing_content"));
    }
}
