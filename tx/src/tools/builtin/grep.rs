//! grep tool - search file contents using the ripgrep libraries

use async_trait::async_trait;
use grep_regex::RegexMatcherBuilder;
use grep_searcher::sinks::UTF8;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::tools::{ParamSpec, ParamType, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult};

use super::glob::search_root;
use super::{TRUNCATED_NOTE, arg_bool, arg_str, require_str};

/// Search file contents for a regex or literal
pub struct GrepTool;

#[derive(Debug)]
struct MatchResult {
    file: String,
    line_num: u64,
    line: String,
}

fn format_results(results: &[MatchResult], truncated: bool, max_line_length: usize) -> String {
    debug!(results_count = %results.len(), truncated, "format_results: called");
    let mut output: Vec<String> = results
        .iter()
        .map(|r| {
            let line: String = if r.line.chars().count() > max_line_length {
                format!("{}...", r.line.chars().take(max_line_length).collect::<String>())
            } else {
                r.line.clone()
            };
            format!("{}:{}: {}", r.file, r.line_num, line)
        })
        .collect();
    if truncated {
        output.push(String::new());
        output.push(TRUNCATED_NOTE.to_string());
    }
    output.join("\n")
}

/// `include` filters on the file name, or on the relative path when it has a `/`
fn include_matches(include: Option<&glob::Pattern>, relative: &str) -> bool {
    let Some(pattern) = include else {
        return true;
    };
    if pattern.as_str().contains('/') {
        return pattern.matches(relative);
    }
    let name = relative.rsplit('/').next().unwrap_or(relative);
    pattern.matches(name)
}

impl GrepTool {
    fn files(&self, ctx: &ToolContext, base: &Path, include: Option<&glob::Pattern>) -> Vec<PathBuf> {
        if base.is_file() {
            return vec![base.to_path_buf()];
        }
        let sandbox = ctx.sandbox();
        WalkDir::new(base)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !sandbox.is_ignored_dir(e.path()))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| include_matches(include, &ctx.display(e.path())))
            .map(|e| e.into_path())
            .collect()
    }

    fn run(&self, input: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let pattern = require_str(input, "pattern")?;
        let literal = arg_bool(input, "literal_text");
        let case_insensitive = arg_bool(input, "case_insensitive");

        let expr = if literal { regex::escape(pattern) } else { pattern.to_string() };
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(case_insensitive)
            .build(&expr)
            .map_err(|e| {
                ToolError::validation(
                    "invalid_regex",
                    format!(
                        "invalid regex {:?}: {}. Escape special characters or pass literal_text=true to search for the exact text.",
                        pattern, e
                    ),
                )
            })?;

        let include = match arg_str(input, "include") {
            Some(glob) => Some(glob::Pattern::new(glob).map_err(|e| {
                ToolError::validation("invalid_pattern", format!("invalid include pattern {}: {}", glob, e))
            })?),
            None => None,
        };

        let (base, base_relative) = search_root(ctx, arg_str(input, "path"))?;
        let files = self.files(ctx, &base, include.as_ref());
        debug!(file_count = %files.len(), "GrepTool::run: files to search");

        let cap = ctx.config().limits.search_cap;
        let mut searcher = SearcherBuilder::new()
            .binary_detection(BinaryDetection::quit(b'\x00'))
            .line_number(true)
            .build();
        let mut results: Vec<MatchResult> = Vec::new();

        for file_path in files {
            if results.len() > cap {
                break;
            }
            let display_path = ctx.display(&file_path);
            let search_result = searcher.search_path(
                &matcher,
                &file_path,
                UTF8(|line_num, line| {
                    results.push(MatchResult {
                        file: display_path.clone(),
                        line_num,
                        line: line.trim_end().to_string(),
                    });
                    Ok(results.len() <= cap)
                }),
            );
            if let Err(e) = search_result {
                // unreadable or non-UTF-8 files are skipped
                debug!(?file_path, %e, "GrepTool::run: skipping file");
            }
        }

        if results.is_empty() {
            return Ok(ToolResult::success(format!("No matches found for {:?} in {}", pattern, base_relative))
                .with_path(base_relative));
        }
        let truncated = results.len() > cap;
        results.truncate(cap);
        let output = format_results(&results, truncated, ctx.config().limits.max_line_length);
        Ok(ToolResult::success(output).with_path(base_relative))
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "grep",
            description: "Search file contents with a regex (or literal text). Returns file:line: text for each match.",
            aliases: &["search", "rg", "ripgrep", "search_files", "grep_search"],
            params: vec![
                ParamSpec::required("pattern", ParamType::String, "Regex pattern to search for")
                    .aliases(&["pat", "query", "regex", "search"]),
                ParamSpec::optional("path", ParamType::String, "File or directory to search (default: sandbox root)")
                    .aliases(&["dir", "directory", "file", "cwd"]),
                ParamSpec::optional("include", ParamType::String, "Glob filter for files, e.g. *.rs")
                    .aliases(&["file_pattern", "glob", "files", "include_pattern"]),
                ParamSpec::optional("literal_text", ParamType::Boolean, "Treat pattern as plain text")
                    .aliases(&["literal", "fixed_strings", "fixed"]),
                ParamSpec::optional("case_insensitive", ParamType::Boolean, "Ignore case")
                    .aliases(&["ignore_case", "insensitive", "i"]),
            ],
            kind: ToolKind::ReadOnly,
            example: r#"{"pattern": "fn main", "include": "*.rs"}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GrepTool::execute: called");
        match self.run(&input, ctx) {
            Ok(result) => result,
            Err(e) => {
                debug!(%e, "GrepTool::execute: failed");
                let path = arg_str(&input, "path").unwrap_or(".").to_string();
                ToolResult::error(e).with_path(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use tempfile::tempdir;
    use tokio::fs;

    fn context(root: &Path) -> ToolContext {
        ToolContext::new(root, Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_grep_basic() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "hello world\nfoo bar\nhello again")
            .await
            .unwrap();
        let ctx = context(temp.path());

        let result = GrepTool.execute(json!({"pattern": "hello", "path": "."}), &ctx).await;

        assert!(!result.is_error);
        assert_eq!(result.text, "test.txt:1: hello world\ntest.txt:3: hello again");
    }

    #[tokio::test]
    async fn test_grep_case_insensitive() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "Hello World\nHELLO AGAIN").await.unwrap();
        let ctx = context(temp.path());

        let result = GrepTool
            .execute(json!({"pattern": "hello", "case_insensitive": true}), &ctx)
            .await;

        assert!(result.text.contains("Hello"));
        assert!(result.text.contains("HELLO"));
    }

    #[tokio::test]
    async fn test_grep_literal_text() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "call(x)\ncallx\n").await.unwrap();
        let ctx = context(temp.path());

        let result = GrepTool
            .execute(json!({"pattern": "call(x)", "literal_text": true}), &ctx)
            .await;
        assert_eq!(result.text, "a.rs:1: call(x)");
    }

    #[tokio::test]
    async fn test_grep_include_filter() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.rs"), "fn main() { hello }").await.unwrap();
        fs::write(temp.path().join("test.txt"), "hello world").await.unwrap();
        let ctx = context(temp.path());

        let result = GrepTool.execute(json!({"pattern": "hello", "include": "*.rs"}), &ctx).await;

        assert!(result.text.contains("test.rs"));
        assert!(!result.text.contains("test.txt"));
    }

    #[tokio::test]
    async fn test_grep_no_matches() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "foo bar baz").await.unwrap();
        let ctx = context(temp.path());

        let result = GrepTool.execute(json!({"pattern": "notfound"}), &ctx).await;
        assert!(!result.is_error);
        assert!(result.text.starts_with("No matches found"));
    }

    #[tokio::test]
    async fn test_grep_invalid_regex() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let result = GrepTool.execute(json!({"pattern": "[invalid"}), &ctx).await;
        assert!(result.is_error);
        assert_eq!(result.code.as_deref(), Some("invalid_regex"));
        assert!(result.text.contains("literal_text=true"));
    }

    #[tokio::test]
    async fn test_grep_cap_and_ignored_dirs() {
        let temp = tempdir().unwrap();
        let body: String = (0..10).map(|i| format!("needle {}\n", i)).collect();
        fs::write(temp.path().join("many.txt"), &body).await.unwrap();
        fs::create_dir(temp.path().join(".git")).await.unwrap();
        fs::write(temp.path().join(".git/config"), "needle").await.unwrap();
        let mut config = Config::default();
        config.limits.search_cap = 4;
        let ctx = ToolContext::new(temp.path(), config).unwrap();

        let result = GrepTool.execute(json!({"pattern": "needle"}), &ctx).await;
        assert_eq!(result.text.lines().filter(|l| l.starts_with("many.txt:")).count(), 4);
        assert!(result.text.ends_with(TRUNCATED_NOTE));
        assert!(!result.text.contains(".git"));
    }

    #[test]
    fn test_format_results() {
        let results = vec![MatchResult {
            file: "test.rs".to_string(),
            line_num: 1,
            line: "hello world".to_string(),
        }];
        assert_eq!(format_results(&results, false, 100), "test.rs:1: hello world");
        assert_eq!(format_results(&results, false, 5), "test.rs:1: hello...");
    }
}
