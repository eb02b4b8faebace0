//! apply_patch tool - multi-file hunk patches, all or nothing

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::patch::{HunkError, PatchOperation, apply_hunks, parse_patch};
use crate::session::{OpKind, content_hash};
use crate::syntax;
use crate::tools::{
    NoopLevel, ParamSpec, ParamType, ResolvedPath, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult,
};

use super::{line_delta, numbered_content, require_str, write_atomic};

const FORMAT_HINT: &str = "Expected format:\n*** Begin Patch\n*** Update File: path/to/file\n@@ optional anchor line\n context line\n-removed line\n+added line\n*** End Patch";

/// Apply a multi-file patch
pub struct ApplyPatchTool;

/// Planned end state of one file
#[derive(Debug, Clone)]
struct Staged {
    relative: String,
    before: Option<String>,
    after: Option<String>,
}

impl Staged {
    fn changed(&self) -> bool {
        self.before != self.after
    }

    fn summary(&self) -> String {
        match (&self.before, &self.after) {
            (None, Some(_)) => format!("A {}", self.relative),
            (Some(_), None) => format!("D {}", self.relative),
            (Some(before), Some(after)) => {
                let (added, removed) = line_delta(before, after);
                format!("M {} (+{} -{})", self.relative, added, removed)
            }
            (None, None) => format!("? {}", self.relative),
        }
    }
}

/// A failed patch and the file it failed on
#[derive(Debug)]
struct PatchFailure {
    error: ToolError,
    path: Option<String>,
}

impl From<ToolError> for PatchFailure {
    fn from(error: ToolError) -> Self {
        Self { error, path: None }
    }
}

impl PatchFailure {
    fn at(error: ToolError, path: &str) -> Self {
        Self {
            error,
            path: Some(path.to_string()),
        }
    }
}

/// Files a patch intends to touch, keyed by absolute path in patch order
#[derive(Default)]
struct Plan {
    files: IndexMap<PathBuf, Staged>,
    /// Update hashes to remember once the patch lands
    hashes: Vec<(PathBuf, String)>,
    fuzzy: bool,
}

impl Plan {
    /// Current content as the patch sees it: staged state first, then disk
    async fn current(&self, resolved: &ResolvedPath) -> Result<Option<String>, ToolError> {
        if let Some(staged) = self.files.get(&resolved.path) {
            return Ok(staged.after.clone());
        }
        read_optional(&resolved.path, &resolved.relative).await
    }

    async fn stage(&mut self, resolved: &ResolvedPath, after: Option<String>) -> Result<(), ToolError> {
        if let Some(staged) = self.files.get_mut(&resolved.path) {
            staged.after = after;
            return Ok(());
        }
        let before = read_optional(&resolved.path, &resolved.relative).await?;
        self.files.insert(
            resolved.path.clone(),
            Staged {
                relative: resolved.relative.clone(),
                before,
                after,
            },
        );
        Ok(())
    }
}

async fn read_optional(path: &Path, relative: &str) -> Result<Option<String>, ToolError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ToolError::io(format!("failed to read {}", relative), e)),
    }
}

fn missing_file(relative: &str, verb: &str) -> ToolError {
    ToolError::not_found(
        "patch_file_not_found",
        format!(
            "cannot {} {}: file not found. Use '*** Add File: {}' to create it, or check the path with glob.",
            verb, relative, relative
        ),
    )
}

fn hunk_failure(err: &HunkError, relative: &str, current: &str) -> ToolError {
    match err {
        HunkError::NotFound { .. } => ToolError::not_found(
            "patch_context_not_found",
            format!(
                "could not apply patch to {}: {}. Context and removed lines must match the file. Current content of {}:\n{}",
                relative,
                err,
                relative,
                numbered_content(current).trim_end()
            ),
        ),
        HunkError::Ambiguous { .. } => ToolError::ambiguous(
            "patch_context_not_unique",
            format!(
                "could not apply patch to {}: {}. Add more context lines, or an '@@ <line>' anchor naming the enclosing function or class.",
                relative, err
            ),
        ),
        HunkError::NoContext { .. } => ToolError::validation(
            "invalid_patch_format",
            format!(
                "could not apply patch to {}: {}. Include at least one unchanged line around the new lines, \
                 an '@@ <line>' anchor naming the line they follow, or '*** End of File' to append.",
                relative, err
            ),
        ),
    }
}

impl ApplyPatchTool {
    async fn plan(&self, text: &str, ctx: &ToolContext) -> Result<Plan, PatchFailure> {
        let patch = parse_patch(text)
            .map_err(|e| ToolError::validation(e.code(), format!("{}. {}", e, FORMAT_HINT)))?;
        debug!(counts = %patch.counts, "ApplyPatchTool::plan: parsed");

        let mut plan = Plan::default();
        for op in &patch.operations {
            let resolved = ctx.resolve(op.path(), false)?;
            let relative = resolved.relative.clone();
            ctx.guard_test_file(&resolved).map_err(|e| PatchFailure::at(e, &relative))?;

            match op {
                PatchOperation::Add { lines, .. } => {
                    if plan.current(&resolved).await?.is_some() {
                        return Err(PatchFailure::at(
                            ToolError::validation(
                                "file_exists",
                                format!("cannot add {}: file already exists. Use '*** Update File: {}' instead.", relative, relative),
                            ),
                            &relative,
                        ));
                    }
                    plan.stage(&resolved, Some(PatchOperation::added_content(lines))).await?;
                }
                PatchOperation::Delete { .. } => {
                    if plan.current(&resolved).await?.is_none() {
                        return Err(PatchFailure::at(missing_file(&relative, "delete"), &relative));
                    }
                    ctx.guard_read_before_edit(&resolved, "deleting")
                        .await
                        .map_err(|e| PatchFailure::at(e, &relative))?;
                    plan.stage(&resolved, None).await?;
                }
                PatchOperation::Update { move_to, hunks, .. } => {
                    let Some(current) = plan.current(&resolved).await? else {
                        return Err(PatchFailure::at(missing_file(&relative, "update"), &relative));
                    };
                    ctx.guard_read_before_edit(&resolved, "patching")
                        .await
                        .map_err(|e| PatchFailure::at(e, &relative))?;

                    let hash = content_hash(&format!("{}\n{:?}\n{:?}", relative, move_to, hunks));
                    if ctx.session().await.last_patch_hash(&resolved.path) == Some(hash.as_str()) {
                        return Err(PatchFailure::at(
                            ToolError::validation(
                                "patch_repeated",
                                format!(
                                    "this exact patch was already applied to {}. Read the file to see its current state before patching again.",
                                    relative
                                ),
                            ),
                            &relative,
                        ));
                    }

                    let applied = match apply_hunks(&current, hunks) {
                        Ok(applied) => applied,
                        Err(e) => {
                            let failures = ctx.session().await.record_patch_failure(&resolved.path);
                            debug!(path = %relative, failures, %e, "ApplyPatchTool::plan: hunk failed");
                            return Err(PatchFailure::at(hunk_failure(&e, &relative, &current), &relative));
                        }
                    };
                    plan.fuzzy |= applied.fuzzy;

                    match move_to {
                        Some(target) => {
                            let dest = ctx.resolve(target, false)?;
                            ctx.guard_test_file(&dest).map_err(|e| PatchFailure::at(e, &dest.relative))?;
                            plan.stage(&resolved, None).await?;
                            plan.stage(&dest, Some(applied.content)).await?;
                            plan.hashes.push((dest.path.clone(), hash));
                        }
                        None => {
                            plan.stage(&resolved, Some(applied.content)).await?;
                            plan.hashes.push((resolved.path.clone(), hash));
                        }
                    }
                }
            }
        }
        Ok(plan)
    }

    async fn run(&self, input: &Value, ctx: &ToolContext) -> Result<ToolResult, PatchFailure> {
        let text = require_str(input, "patch")?;
        let plan = self.plan(text, ctx).await?;

        if ctx.config().escalation.syntax_guard {
            for (path, staged) in &plan.files {
                if let (Some(before), Some(after)) = (&staged.before, &staged.after)
                    && let Err(rejection) = syntax::guard(path, Some(before), after)
                {
                    let error = ToolError::SyntaxRejected {
                        path: staged.relative.clone(),
                        language: rejection.language,
                        reason: rejection.reason,
                    };
                    return Err(PatchFailure::at(error, &staged.relative));
                }
            }
        }

        let changes: Vec<(&PathBuf, &Staged)> = plan.files.iter().filter(|(_, s)| s.changed()).collect();
        if changes.is_empty() {
            return Ok(self.noop(&plan, ctx).await);
        }

        commit(&changes).await.map_err(|e| match changes.first() {
            Some((_, staged)) => PatchFailure::at(e, &staged.relative),
            None => PatchFailure::from(e),
        })?;

        {
            let mut session = ctx.session().await;
            for (path, _) in &changes {
                session.record_mutation(path);
                session.clear_patch_failures(path);
            }
            for (path, hash) in &plan.hashes {
                session.set_patch_hash(path, hash.clone());
            }
        }

        let mut out = String::from("Success. Updated the following files:\n");
        out.push_str(&changes.iter().map(|(_, s)| s.summary()).collect::<Vec<_>>().join("\n"));
        if plan.fuzzy {
            out.push_str("\n(note: some hunks matched only after ignoring whitespace differences)");
        }
        let first = changes.first().map(|(_, s)| s.relative.clone()).unwrap_or_default();
        Ok(ToolResult::success(out).with_code("applied").with_path(first))
    }

    async fn noop(&self, plan: &Plan, ctx: &ToolContext) -> ToolResult {
        let mut level = NoopLevel::First;
        {
            let mut session = ctx.session().await;
            for path in plan.files.keys() {
                if session.record_noop(path, OpKind::Patch) == NoopLevel::Repeated {
                    level = NoopLevel::Repeated;
                }
            }
        }
        let names: Vec<&str> = plan.files.values().map(|s| s.relative.as_str()).collect();
        debug!(?names, ?level, "ApplyPatchTool::noop: called");
        let text = match level {
            NoopLevel::First => format!(
                "ok: no changes: the patch leaves {} exactly as it is (no-op). The file already contains these lines; read it if you are unsure of its current state.",
                names.join(", ")
            ),
            NoopLevel::Repeated => "ok: no changes (patch no-op)".to_string(),
        };
        ToolResult::noop(text, level).with_path(names.first().copied().unwrap_or_default())
    }
}

/// Write every staged file; on failure put back what was already written
async fn commit(changes: &[(&PathBuf, &Staged)]) -> Result<(), ToolError> {
    let mut done: Vec<(&PathBuf, &Staged)> = Vec::with_capacity(changes.len());
    for &(path, staged) in changes {
        let outcome = match &staged.after {
            Some(content) => write_atomic(path, content).await,
            None => tokio::fs::remove_file(path)
                .await
                .map_err(|e| ToolError::io(format!("failed to delete {}", staged.relative), e)),
        };
        if let Err(e) = outcome {
            warn!(path = %staged.relative, %e, "commit: failed, restoring earlier files");
            for &(path, staged) in done.iter().rev() {
                let restored = match &staged.before {
                    Some(content) => write_atomic(path, content).await,
                    None => tokio::fs::remove_file(path)
                        .await
                        .map_err(|e| ToolError::io(format!("failed to remove {}", staged.relative), e)),
                };
                if let Err(restore_err) = restored {
                    warn!(path = %staged.relative, %restore_err, "commit: restore failed");
                }
            }
            return Err(e);
        }
        done.push((path, staged));
    }
    Ok(())
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "apply_patch",
            description: "Apply a multi-file patch. Every hunk must match or nothing is written. Format: *** Begin Patch / *** Add File: p / *** Delete File: p / *** Update File: p, then @@ hunks with ' ', '-', '+' lines / *** End Patch.",
            aliases: &["patch", "apply_diff", "applypatch"],
            params: vec![
                ParamSpec::required("patch", ParamType::String, "Patch text from '*** Begin Patch' to '*** End Patch'")
                    .aliases(&["input", "diff", "patch_text", "content"]),
            ],
            kind: ToolKind::Mutating,
            example: r#"{"patch": "*** Begin Patch\n*** Update File: a.txt\n@@\n-old\n+new\n*** End Patch"}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ApplyPatchTool::execute: called");
        match self.run(&input, ctx).await {
            Ok(result) => result,
            Err(failure) => {
                debug!(error = %failure.error, path = ?failure.path, "ApplyPatchTool::execute: failed");
                ctx.session().await.record_failed_mutation();
                let result = ToolResult::error(failure.error);
                match failure.path {
                    Some(path) => result.with_path(path),
                    None => result,
                }
            }
        }
    }
}
