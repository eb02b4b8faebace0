//! glob tool - find files matching a pattern

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

use crate::tools::{ParamSpec, ParamType, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult};

use super::{TRUNCATED_NOTE, arg_str, require_str};

/// Above this many matches, sort by name instead of statting every file
const MTIME_SORT_LIMIT: usize = 200;

/// Find files matching a glob pattern
pub struct GlobTool;

/// Resolve an optional directory argument for the search tools
pub(crate) fn search_root(ctx: &ToolContext, path: Option<&str>) -> Result<(PathBuf, String), ToolError> {
    let requested = path.filter(|p| !p.trim().is_empty()).unwrap_or(".");
    let resolved = ctx.resolve(requested, false)?;
    if !resolved.exists() {
        return Err(ToolError::not_found(
            "path_missing",
            format!("path does not exist: {}", requested),
        ));
    }
    Ok((resolved.path, resolved.relative))
}

fn mtime(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

impl GlobTool {
    fn run(&self, input: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let pattern = require_str(input, "pattern")?.trim();
        if pattern.is_empty() {
            return Err(ToolError::validation("invalid_pattern", "pattern must not be empty"));
        }
        if Path::new(pattern).components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(ToolError::validation(
                "invalid_pattern",
                format!("pattern {} must not contain '..'; pass a path inside the sandbox instead", pattern),
            ));
        }

        let (base, base_relative) = search_root(ctx, arg_str(input, "path"))?;
        // bare patterns like `*.rs` match at any depth
        let pattern = pattern.trim_start_matches('/');
        let effective = if pattern.contains('/') {
            pattern.to_string()
        } else {
            format!("**/{}", pattern)
        };
        debug!(%effective, "GlobTool::run: walking");

        let matcher = Pattern::new(&effective)
            .map_err(|e| ToolError::validation("invalid_pattern", format!("invalid glob pattern {}: {}", pattern, e)))?;
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };

        // ignored directories are pruned, never descended into
        let sandbox = ctx.sandbox();
        let mut matches: Vec<PathBuf> = WalkDir::new(&base)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !sandbox.is_ignored_dir(e.path()))
            .flatten()
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .strip_prefix(&base)
                    .is_ok_and(|rel| matcher.matches_path_with(rel, options))
            })
            .map(|e| e.into_path())
            .collect();
        debug!(count = matches.len(), "GlobTool::run: matches found");

        if matches.is_empty() {
            return Ok(ToolResult::success(format!(
                "No files found matching {} in {}",
                pattern, base_relative
            ))
            .with_path(base_relative));
        }

        if matches.len() <= MTIME_SORT_LIMIT {
            matches.sort_by_key(|p| std::cmp::Reverse(mtime(p)));
        } else {
            matches.sort();
        }

        let cap = ctx.config().limits.search_cap;
        let truncated = matches.len() > cap;
        let mut out: Vec<String> = matches.iter().take(cap).map(|p| ctx.display(p)).collect();
        if truncated {
            out.push(String::new());
            out.push(TRUNCATED_NOTE.to_string());
        }
        Ok(ToolResult::success(out.join("\n")).with_path(base_relative))
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "glob",
            description: "Find files by glob pattern (e.g. **/*.rs). Patterns without '/' match at any depth. Newest files first.",
            aliases: &["find", "find_files", "glob_files", "file_search"],
            params: vec![
                ParamSpec::required("pattern", ParamType::String, "Glob pattern to match")
                    .aliases(&["pat", "glob", "file_pattern", "name"]),
                ParamSpec::optional("path", ParamType::String, "Base directory (default: sandbox root)")
                    .aliases(&["dir", "directory", "base", "cwd", "root"]),
            ],
            kind: ToolKind::ReadOnly,
            example: r#"{"pattern": "**/*.rs", "path": "src"}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GlobTool::execute: called");
        match self.run(&input, ctx) {
            Ok(result) => result,
            Err(e) => {
                debug!(%e, "GlobTool::execute: failed");
                let path = arg_str(&input, "path").unwrap_or(".").to_string();
                ToolResult::error(e).with_path(path)
            }
        }
    }
}
