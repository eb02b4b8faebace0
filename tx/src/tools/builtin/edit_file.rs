//! edit tool - exact string replacement with uniqueness checks

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::patch::{Tier, find_all, leading_whitespace, reindent, split_content_lines};
use crate::session::OpKind;
use crate::syntax;
use crate::tools::{NoopLevel, ParamSpec, ParamType, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult};

use super::{arg_bool, line_delta, numbered_content, require_str, restore_line_endings, split_line_endings, write_atomic};

/// Edit a file by replacing `old` with `new`
pub struct EditFileTool;

/// 1-based line of a byte offset
fn line_of(content: &str, byte: usize) -> usize {
    content[..byte].matches('\n').count() + 1
}

fn join_numbers(lines: &[usize]) -> String {
    lines.iter().map(usize::to_string).collect::<Vec<_>>().join(", ")
}

/// Whole-line match of `old` ignoring whitespace differences.
///
/// `Ok(Some((start, len)))` is a unique block of lines; `Err` carries the
/// 1-based start lines when several blocks match.
fn loose_block(content: &str, old: &str) -> Result<Option<(usize, usize)>, Vec<usize>> {
    let lines = split_content_lines(content);
    let needle: Vec<String> = old.trim_end_matches('\n').lines().map(str::to_string).collect();
    if needle.is_empty() || needle.iter().all(|l| l.trim().is_empty()) {
        return Ok(None);
    }
    for tier in [Tier::TrimEnd, Tier::Normalized] {
        match find_all(&lines, &needle, tier)[..] {
            [] => continue,
            [start] => return Ok(Some((start, needle.len()))),
            ref many => return Err(many.iter().map(|p| p + 1).collect()),
        }
    }
    Ok(None)
}

/// Replace a loosely matched block, moving `new` onto the block's indentation
fn replace_block(content: &str, start: usize, len: usize, old: &str, new: &str) -> String {
    let lines = split_content_lines(content);
    let (old_indent, file_indent) = old
        .lines()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .map_or((String::new(), String::new()), |(offset, line)| {
            (
                leading_whitespace(line).to_string(),
                leading_whitespace(&lines[start + offset]).to_string(),
            )
        });

    let mut out: Vec<String> = lines[..start].to_vec();
    out.extend(new.trim_end_matches('\n').lines().map(|line| {
        if line.trim().is_empty() {
            line.to_string()
        } else {
            reindent(line, &old_indent, &file_indent)
        }
    }));
    out.extend(lines[start + len..].iter().cloned());
    let mut joined = out.join("\n");
    if content.ends_with('\n') && !out.is_empty() {
        joined.push('\n');
    }
    joined
}

impl EditFileTool {
    async fn run(&self, input: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let path = require_str(input, "path")?;
        let old = require_str(input, "old")?;
        let new = require_str(input, "new")?;
        let replace_all = arg_bool(input, "all");

        let resolved = ctx.resolve(path, false)?;
        if !resolved.exists() {
            return Err(ToolError::not_found(
                "file_not_found",
                format!("File not found: {}. Use write to create a new file.", resolved.relative),
            ));
        }
        if resolved.path.is_dir() {
            return Err(ToolError::validation(
                "is_directory",
                format!("{} is a directory; edit needs a file path", resolved.relative),
            ));
        }
        ctx.guard_test_file(&resolved)?;
        ctx.guard_read_before_edit(&resolved, "editing").await?;
        let relative = resolved.relative.clone();

        if old == new {
            let level = ctx.session().await.record_noop(&resolved.path, OpKind::Edit);
            debug!(path = %relative, ?level, "EditFileTool::run: old equals new");
            let text = match level {
                NoopLevel::First => format!(
                    "ok: no changes: old and new are identical, so nothing was edited in {}. \
                     If you meant to change this code, put the modified text in new. \
                     For larger rewrites use write with the full file content.",
                    relative
                ),
                NoopLevel::Repeated => "ok: no changes (old equals new)".to_string(),
            };
            return Ok(ToolResult::noop(text, level).with_path(relative));
        }
        if old.is_empty() {
            return Err(ToolError::validation(
                "empty_old",
                "old must not be empty; use write to create or replace a whole file",
            ));
        }

        let raw = tokio::fs::read_to_string(&resolved.path)
            .await
            .map_err(|e| ToolError::io(format!("failed to read {}", relative), e))?;

        // CRLF files are edited in LF form unless the call itself speaks CRLF
        let (content, crlf) = if old.contains('\r') {
            (raw.clone(), false)
        } else {
            split_line_endings(&raw)
        };
        let new = if crlf { new.replace("\r\n", "\n") } else { new.to_string() };

        let positions: Vec<usize> = content.match_indices(old).map(|(idx, _)| idx).collect();
        let (updated, replaced, loose) = match positions.len() {
            0 => match loose_block(&content, old) {
                Ok(Some((start, len))) => {
                    debug!(path = %relative, start, len, "EditFileTool::run: whitespace-insensitive match");
                    (replace_block(&content, start, len, old, &new), 1, true)
                }
                Ok(None) => {
                    return Err(ToolError::not_found(
                        "old_not_found",
                        format!(
                            "old text not found in {}. Make sure it matches the file exactly, including whitespace and indentation. Current content of {}:\n{}",
                            relative,
                            relative,
                            numbered_content(&content).trim_end()
                        ),
                    ));
                }
                Err(lines) => {
                    return Err(ToolError::ambiguous(
                        "old_not_unique",
                        format!(
                            "old text matches {} places in {} (lines {}) when whitespace is ignored. Include more surrounding lines in old so it matches exactly once.",
                            lines.len(),
                            relative,
                            join_numbers(&lines)
                        ),
                    ));
                }
            },
            1 => (content.replacen(old, &new, 1), 1, false),
            n if replace_all => (content.replace(old, &new), n, false),
            n => {
                let lines: Vec<usize> = positions.iter().map(|&p| line_of(&content, p)).collect();
                return Err(ToolError::ambiguous(
                    "old_not_unique",
                    format!(
                        "old text found {} times in {} (lines {}). Add more surrounding context to old so it matches exactly once, or set all=true to replace every occurrence.",
                        n,
                        relative,
                        join_numbers(&lines)
                    ),
                ));
            }
        };

        let updated = restore_line_endings(updated, crlf);
        if ctx.config().escalation.syntax_guard
            && let Err(rejection) = syntax::guard(&resolved.path, Some(&raw), &updated)
        {
            debug!(path = %relative, %rejection.reason, "EditFileTool::run: syntax guard rejected");
            return Err(ToolError::SyntaxRejected {
                path: relative,
                language: rejection.language,
                reason: rejection.reason,
            });
        }

        write_atomic(&resolved.path, &updated).await?;
        let edits = {
            let mut session = ctx.session().await;
            session.record_mutation(&resolved.path);
            session.record_edit(&resolved.path)
        };

        let escalation = &ctx.config().escalation;
        if let Some(cap) = escalation.edit_cap
            && edits > cap
        {
            debug!(path = %relative, edits, cap, "EditFileTool::run: past edit cap");
            let text = escalation.edit_cap_message.replace("{path}", &relative);
            return Ok(ToolResult::success(text).with_code("replaced").with_path(relative));
        }

        let (added, removed) = line_delta(&raw, &updated);
        let mut text = format!(
            "Edited {}: replaced {} occurrence{} (+{} -{} lines)",
            relative,
            replaced,
            if replaced == 1 { "" } else { "s" },
            added,
            removed
        );
        if loose {
            text.push_str(" (matched ignoring whitespace differences)");
        }
        Ok(ToolResult::success(text).with_code("replaced").with_path(relative))
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "edit",
            description: "Replace an exact snippet of a file. old must match exactly once unless all=true.",
            aliases: &["edit_file", "str_replace", "replace", "str_replace_editor"],
            params: vec![
                ParamSpec::required("path", ParamType::String, "File path relative to the sandbox root")
                    .aliases(&["file_path", "filepath", "file", "filename"]),
                ParamSpec::required("old", ParamType::String, "Exact text to replace")
                    .aliases(&["old_string", "old_str", "old_text", "search", "find"]),
                ParamSpec::required("new", ParamType::String, "Replacement text")
                    .aliases(&["new_string", "new_str", "new_text", "replacement", "replace"]),
                ParamSpec::optional("all", ParamType::Boolean, "Replace every occurrence")
                    .aliases(&["replace_all", "global"]),
            ],
            kind: ToolKind::Mutating,
            example: r#"{"path": "src/lib.rs", "old": "let x = 1;", "new": "let x = 2;"}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "EditFileTool::execute: called");
        match self.run(&input, ctx).await {
            Ok(result) => result,
            Err(e) => {
                debug!(%e, "EditFileTool::execute: failed");
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
    async fn test_edit_replaces_unique_match() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "hello world\ngoodbye\n").unwrap();
        let ctx = context(temp.path());

        let result = EditFileTool
            .execute(json!({"path": "a.txt", "old": "world", "new": "there"}), &ctx)
            .await;

        assert!(!result.is_error, "{}", result.text);
        assert_eq!(result.code.as_deref(), Some("replaced"));
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "hello there\ngoodbye\n");
    }

    #[tokio::test]
    async fn test_edit_not_found_includes_content() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "alpha\nbeta\n").unwrap();
        let ctx = context(temp.path());

        let result = EditFileTool
            .execute(json!({"path": "a.txt", "old": "gamma", "new": "delta"}), &ctx)
            .await;

        assert!(result.is_error);
        assert_eq!(result.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(result.code.as_deref(), Some("old_not_found"));
        assert!(result.text.contains("   1| alpha\n   2| beta"));
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "alpha\nbeta\n");
    }

    #[tokio::test]
    async fn test_edit_ambiguous_lists_lines() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "x = 1\ny = 2\nx = 1\n").unwrap();
        let ctx = context(temp.path());

        let result = EditFileTool
            .execute(json!({"path": "a.txt", "old": "x = 1", "new": "x = 3"}), &ctx)
            .await;
        assert!(result.is_error);
        assert_eq!(result.error_kind, Some(ErrorKind::AmbiguousMatch));
        assert!(result.text.contains("found 2 times in a.txt (lines 1, 3)"));

        let all = EditFileTool
            .execute(json!({"path": "a.txt", "old": "x = 1", "new": "x = 3", "all": true}), &ctx)
            .await;
        assert!(!all.is_error);
        assert!(all.text.contains("replaced 2 occurrences"));
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "x = 3\ny = 2\nx = 3\n");
    }

    #[tokio::test]
    async fn test_edit_old_equals_new_is_noop() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "same\n").unwrap();
        let ctx = context(temp.path());
        let input = json!({"path": "a.txt", "old": "same", "new": "same"});

        let first = EditFileTool.execute(input.clone(), &ctx).await;
        assert!(!first.is_error);
        assert_eq!(first.noop, Some(NoopLevel::First));
        assert!(first.text.contains("old and new are identical"));

        let second = EditFileTool.execute(input, &ctx).await;
        assert_eq!(second.noop, Some(NoopLevel::Repeated));
        assert_eq!(second.text, "ok: no changes (old equals new)");
    }

    #[tokio::test]
    async fn test_edit_preserves_crlf() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "one\r\ntwo\r\nthree\r\n").unwrap();
        let ctx = context(temp.path());

        let result = EditFileTool
            .execute(json!({"path": "a.txt", "old": "one\ntwo", "new": "1\n2"}), &ctx)
            .await;
        assert!(!result.is_error, "{}", result.text);
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "1\r\n2\r\nthree\r\n");
    }

    #[tokio::test]
    async fn test_edit_whitespace_insensitive_fallback() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "def f():\n    return 1   \n").unwrap();
        let ctx = context(temp.path());

        let result = EditFileTool
            .execute(json!({"path": "a.py", "old": "    return 1", "new": "    return 2"}), &ctx)
            .await;
        // exact substring still matches here, trailing spaces stay
        assert!(!result.is_error);
        assert_eq!(fs::read_to_string(temp.path().join("a.py")).unwrap(), "def f():\n    return 2   \n");

        let loose = EditFileTool
            .execute(json!({"path": "a.py", "old": "def  f():\n  return 2", "new": "def g():\n    return 2"}), &ctx)
            .await;
        assert!(!loose.is_error, "{}", loose.text);
        assert!(loose.text.contains("ignoring whitespace"));
        assert_eq!(fs::read_to_string(temp.path().join("a.py")).unwrap(), "def g():\n    return 2\n");
    }

    #[tokio::test]
    async fn test_edit_loose_match_keeps_nested_indent() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "class A:\n    def f(self):\n        return 1\n").unwrap();
        let ctx = context(temp.path());

        let result = EditFileTool
            .execute(
                json!({"path": "a.py", "old": "def f(self):\n    return 1", "new": "def f(self):\n\n    return 2"}),
                &ctx,
            )
            .await;

        assert!(!result.is_error, "{}", result.text);
        assert!(result.text.contains("ignoring whitespace"));
        assert_eq!(
            fs::read_to_string(temp.path().join("a.py")).unwrap(),
            "class A:\n    def f(self):\n\n        return 2\n"
        );
    }

    #[tokio::test]
    async fn test_edit_syntax_guard_rolls_back() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("c.json"), "{\"a\": 1}\n").unwrap();
        let ctx = context(temp.path());

        let result = EditFileTool
            .execute(json!({"path": "c.json", "old": "1}", "new": "1"}), &ctx)
            .await;
        assert!(result.is_error);
        assert_eq!(result.error_kind, Some(ErrorKind::SyntaxGuardRejection));
        assert_eq!(fs::read_to_string(temp.path().join("c.json")).unwrap(), "{\"a\": 1}\n");
    }

    #[tokio::test]
    async fn test_edit_missing_file() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let result = EditFileTool
            .execute(json!({"path": "nope.txt", "old": "a", "new": "b"}), &ctx)
            .await;
        assert_eq!(result.code.as_deref(), Some("file_not_found"));
        assert!(!temp.path().join("nope.txt").exists());
    }

    #[tokio::test]
    async fn test_edit_cap_minimal_ack() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "v0\n").unwrap();
        let mut config = Config::default();
        config.escalation.edit_cap = Some(1);
        config.escalation.edit_cap_message = "ok ({path})".to_string();
        let ctx = ToolContext::new(temp.path(), config).unwrap();

        let first = EditFileTool.execute(json!({"path": "a.txt", "old": "v0", "new": "v1"}), &ctx).await;
        assert!(first.text.starts_with("Edited a.txt"));
        let second = EditFileTool.execute(json!({"path": "a.txt", "old": "v1", "new": "v2"}), &ctx).await;
        assert_eq!(second.text, "ok (a.txt)");
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "v2\n");
    }

    #[tokio::test]
    async fn test_edit_requires_read_when_configured() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "v0\n").unwrap();
        let mut config = Config::default();
        config.escalation.require_read_before_edit = true;
        let ctx = ToolContext::new(temp.path(), config).unwrap();

        let result = EditFileTool.execute(json!({"path": "a.txt", "old": "v0", "new": "v1"}), &ctx).await;
        assert_eq!(result.code.as_deref(), Some("must_read_first"));
    }
}
