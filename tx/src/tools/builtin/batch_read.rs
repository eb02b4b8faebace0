//! batch_read tool - several whole-file reads in one call

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::debug;

use crate::tools::{ParamSpec, ParamType, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult};

use super::read_file::{ReadRequest, read_file};

/// Read multiple files; each gets its own `=== FILE: path ===` section
pub struct BatchReadTool;

#[async_trait]
impl Tool for BatchReadTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "batch_read",
            description: "Read several files at once. Each file is shown in its own section with line numbers.",
            aliases: &["read_files", "read_many", "multi_read"],
            params: vec![
                ParamSpec::required("paths", ParamType::StringArray, "File paths relative to the sandbox root")
                    .aliases(&["files", "file_paths", "filenames"]),
            ],
            kind: ToolKind::ReadOnly,
            example: r#"{"paths": ["src/lib.rs", "Cargo.toml"]}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "BatchReadTool::execute: called");
        let paths: Vec<String> = input
            .get("paths")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        if paths.is_empty() {
            return ToolResult::error(ToolError::validation("invalid_arguments", "paths must list at least one file"));
        }
        let max = ctx.config().limits.batch_read_max;
        if paths.len() > max {
            return ToolResult::error(ToolError::validation(
                "too_many_paths",
                format!("too many paths ({}); batch_read accepts at most {} per call", paths.len(), max),
            ));
        }

        let requests: Vec<ReadRequest> = paths.iter().map(ReadRequest::new).collect();
        let outcomes = join_all(requests.iter().map(|req| read_file(ctx, req))).await;

        let mut sections = Vec::with_capacity(outcomes.len());
        let mut first_error: Option<ToolError> = None;
        let mut failures = 0usize;
        for (path, outcome) in paths.iter().zip(outcomes) {
            match outcome {
                Ok(out) => sections.push(format!("=== FILE: {} ===\n{}", out.relative, out.text)),
                Err(e) => {
                    debug!(%path, %e, "BatchReadTool::execute: file failed");
                    failures += 1;
                    sections.push(format!("=== FILE: {} ===\nerror: {}", path, e));
                    first_error.get_or_insert(e);
                }
            }
        }
        let text = sections.join("\n\n");

        match first_error {
            // a batch only fails when nothing could be read
            Some(err) if failures == paths.len() => ToolResult {
                text,
                ..ToolResult::error(err)
            },
            _ => ToolResult::success(text).with_code("read"),
        }
    }
}
