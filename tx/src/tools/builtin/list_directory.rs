//! ls tool - list files and directories

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{ParamSpec, ParamType, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult};

use super::glob::search_root;
use super::{TRUNCATED_NOTE, arg_str};

/// List files and directories in a path
pub struct ListDirectoryTool;

impl ListDirectoryTool {
    async fn run(&self, input: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let (full_path, relative) = search_root(ctx, arg_str(input, "path"))?;
        if !full_path.is_dir() {
            return Err(ToolError::validation(
                "not_a_directory",
                format!("{} is a file, not a directory. Use read to view it.", relative),
            ));
        }

        let mut dir = tokio::fs::read_dir(&full_path)
            .await
            .map_err(|e| ToolError::io(format!("failed to read directory {}", relative), e))?;

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => {
                    debug!(%name, "ListDirectoryTool::run: failed to get metadata, skipping entry");
                    continue;
                }
            };
            if metadata.is_dir() && ctx.sandbox().is_ignored_dir(&entry.path()) {
                continue;
            }
            let suffix = if metadata.is_dir() { "/" } else { "" };
            entries.push(format!("{}{}", name, suffix));
        }

        entries.sort();
        debug!(entries_count = %entries.len(), "ListDirectoryTool::run: entries collected");

        if entries.is_empty() {
            return Ok(ToolResult::success(format!("{} is an empty directory", relative)).with_path(relative));
        }
        let cap = ctx.config().limits.search_cap;
        let truncated = entries.len() > cap;
        entries.truncate(cap);
        if truncated {
            entries.push(String::new());
            entries.push(TRUNCATED_NOTE.to_string());
        }
        Ok(ToolResult::success(entries.join("\n")).with_path(relative))
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "ls",
            description: "List the entries of a directory. Directories end with '/'.",
            aliases: &["list", "list_directory", "list_dir", "list_files", "dir"],
            params: vec![
                ParamSpec::optional("path", ParamType::String, "Directory relative to the sandbox root (default: .)")
                    .aliases(&["dir", "directory", "folder", "file_path"]),
            ],
            kind: ToolKind::ReadOnly,
            example: r#"{"path": "src"}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ListDirectoryTool::execute: called");
        match self.run(&input, ctx).await {
            Ok(result) => result,
            Err(e) => {
                debug!(%e, "ListDirectoryTool::execute: failed");
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
    use std::fs;
    use tempfile::tempdir;

    fn context(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root, Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_list_directory_basic() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("file1.txt"), "").unwrap();
        fs::write(temp.path().join("file2.txt"), "").unwrap();
        fs::create_dir(temp.path().join("subdir")).unwrap();
        fs::create_dir(temp.path().join("node_modules")).unwrap();
        let ctx = context(temp.path());

        let result = ListDirectoryTool.execute(json!({}), &ctx).await;

        assert!(!result.is_error);
        assert_eq!(result.text, "file1.txt\nfile2.txt\nsubdir/");
    }

    #[tokio::test]
    async fn test_list_directory_with_path() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("subdir")).unwrap();
        fs::write(temp.path().join("subdir/nested.txt"), "").unwrap();
        let ctx = context(temp.path());

        let result = ListDirectoryTool.execute(json!({"path": "subdir"}), &ctx).await;
        assert_eq!(result.text, "nested.txt");
        assert_eq!(result.path.as_deref(), Some("subdir"));
    }

    #[tokio::test]
    async fn test_list_directory_empty() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let result = ListDirectoryTool.execute(json!({}), &ctx).await;
        assert!(!result.is_error);
        assert_eq!(result.text, ". is an empty directory");
    }

    #[tokio::test]
    async fn test_list_directory_not_found() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path());

        let result = ListDirectoryTool.execute(json!({"path": "nonexistent"}), &ctx).await;
        assert!(result.is_error);
        assert_eq!(result.code.as_deref(), Some("path_missing"));
    }
}
