//! Feedback rule engine - table-driven guidance appended to tool results
//!
//! Each [`FeedbackRule`] pairs a predicate over a finished call (tool name,
//! error kind, outcome code, no-op level) with a handlebars template. The
//! first matching rule wins. Rules from configuration are consulted before the
//! built-in table, so a project can override any message without touching the
//! executor.

use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tools::{ErrorKind, NoopLevel};

use super::TOOL_AFTER;
use super::bus::{Hook, HookError};
use super::payload::HookPayload;

fn all_tools() -> Vec<String> {
    vec!["*".to_string()]
}

/// One row of the feedback table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedbackRule {
    /// Stable identifier reported as `feedback_reason`
    pub reason: String,

    /// Canonical tool names, or `*` for any tool
    #[serde(default = "all_tools")]
    pub tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,

    /// Outcome code such as `old_not_found` or `noop`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noop: Option<NoopLevel>,

    pub template: String,

    /// Appended once `attempt` reaches `repeat-after`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_after: Option<u32>,
}

impl FeedbackRule {
    pub fn new(reason: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            tools: all_tools(),
            kind: None,
            code: None,
            noop: None,
            template: template.into(),
            repeat_template: None,
            repeat_after: None,
        }
    }

    pub fn for_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn on_noop(mut self, level: NoopLevel) -> Self {
        self.noop = Some(level);
        self.code = Some("noop".to_string());
        self
    }

    pub fn with_repeat(mut self, after: u32, template: impl Into<String>) -> Self {
        self.repeat_after = Some(after);
        self.repeat_template = Some(template.into());
        self
    }

    fn targets_noop(&self) -> bool {
        self.noop.is_some() || self.code.as_deref() == Some("noop")
    }

    fn matches(&self, outcome: &Outcome<'_>) -> bool {
        if !self.tools.iter().any(|t| t == "*" || t == outcome.tool) {
            return false;
        }
        // successful no-ops only reach rules written for them
        if !outcome.is_error && !self.targets_noop() {
            return false;
        }
        if let Some(kind) = self.kind
            && outcome.kind != Some(kind)
        {
            return false;
        }
        if let Some(code) = &self.code
            && outcome.code != Some(code.as_str())
        {
            return false;
        }
        if let Some(level) = self.noop
            && outcome.noop != Some(level)
        {
            return false;
        }
        true
    }
}

/// The parts of a `tool_after` payload the rules look at
#[derive(Debug)]
struct Outcome<'a> {
    tool: &'a str,
    is_error: bool,
    kind: Option<ErrorKind>,
    code: Option<&'a str>,
    noop: Option<NoopLevel>,
}

impl<'a> Outcome<'a> {
    /// `None` for plain successes and repeated no-ops, which never get feedback
    fn from_payload(payload: &'a HookPayload) -> Option<Self> {
        let noop = payload
            .get("noop")
            .and_then(|v| serde_json::from_value::<NoopLevel>(v.clone()).ok());
        let is_error = payload.flag("is_error");
        if !is_error && noop.is_none_or(|level| level == NoopLevel::Repeated) {
            return None;
        }
        Some(Self {
            tool: payload.str("tool_name").unwrap_or_default(),
            is_error,
            kind: payload.str("error_kind").and_then(|k| k.parse().ok()),
            code: payload.str("code"),
            noop,
        })
    }
}

/// Values available to feedback templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackVars {
    pub tool: String,
    pub target: String,
    pub path_value: String,
    pub read_tool: &'static str,
    pub edit_tool: &'static str,
    pub write_tool: &'static str,
    pub patch_tool: &'static str,
    pub ls_tool: &'static str,
    pub glob_tool: &'static str,
    pub attempt: u64,
}

impl FeedbackVars {
    fn from_payload(payload: &HookPayload) -> Self {
        let tool = payload.str("tool_name").unwrap_or_default().to_string();
        let path_value = payload
            .str("path_value")
            .filter(|p| !p.is_empty())
            .unwrap_or_default()
            .to_string();
        Self {
            target: describe_target(&tool, &path_value),
            tool,
            path_value,
            read_tool: "read",
            edit_tool: "edit",
            write_tool: "write",
            patch_tool: "apply_patch",
            ls_tool: "ls",
            glob_tool: "glob",
            attempt: payload.u64("attempt").unwrap_or(0),
        }
    }
}

fn describe_target(tool: &str, path_value: &str) -> String {
    let action = match tool {
        "apply_patch" => "patch",
        "edit" => "edit",
        "write" => "write",
        _ => "read",
    };
    if !path_value.is_empty() {
        return format!("the SAME path you attempted to {}: {}", action, path_value);
    }
    if tool == "apply_patch" {
        return "the file named in the patch header line: '*** Update File: <path>'".to_string();
    }
    format!(
        "the SAME path you attempted to {} (use the 'path' argument from your tool call)",
        action
    )
}

/// The built-in feedback table, in match order
pub fn builtin_rules() -> Vec<FeedbackRule> {
    vec![
        FeedbackRule::new(
            "unknown_tool_name",
            "FORMAT ERROR: unknown tool name was called.\n\
             ACTION: use only the available tools listed in the error.\n\
             Common choices: {{read_tool}}, {{write_tool}}, {{edit_tool}}, {{patch_tool}}.\n\
             Do not retry the same unknown tool name.",
        )
        .with_code("unknown_tool"),
        FeedbackRule::new(
            "shell_command_blocked",
            "ERROR: shell refused the command.\n\
             ACTION: run ONE allowlisted command per call with no pipes, chaining, cd or inline code. \
             Pass workdir instead of cd, and use {{read_tool}}, {{glob_tool}} or {{edit_tool}} for file work.",
        )
        .for_tools(&["shell"])
        .with_code("command_blocked"),
        FeedbackRule::new(
            "missing_tool_name",
            "FORMAT ERROR: the tool call had no tool name.\n\
             ACTION: call one of the available tools by name, e.g. {{read_tool}}(path).",
        )
        .with_code("missing_tool_name"),
        FeedbackRule::new(
            "patch_context_not_found",
            "FORMAT ERROR: {{patch_tool}} failed: patch context not found.\n\
             ACTION: Call {{read_tool}}(path) for {{target}} (use {{read_tool}}, NOT grep/search), \
             then retry {{patch_tool}} using the CURRENT content with exact context lines.\n\
             Do NOT repeat the same patch.",
        )
        .for_tools(&["apply_patch"])
        .with_code("patch_context_not_found")
        .with_repeat(
            2,
            "SECOND FAILURE on same file ({{path_value}}): STOP patching; re-read and switch to {{edit_tool}} or {{write_tool}}.",
        ),
        FeedbackRule::new(
            "patch_context_not_unique",
            "FORMAT ERROR: {{patch_tool}} failed: patch context not unique.\n\
             ACTION: Call {{read_tool}}(path) for {{target}}, then retry {{patch_tool}} with MORE unique context lines, \
             OR switch to {{edit_tool}} / {{write_tool}} if the file is small.",
        )
        .for_tools(&["apply_patch"])
        .with_code("patch_context_not_unique"),
        FeedbackRule::new(
            "must_read_before_patching",
            "FORMAT ERROR: {{patch_tool}} requires the file to be read first.\n\
             ACTION: Call {{read_tool}}(path) for {{target}} (use {{read_tool}}, NOT grep/search), then retry {{patch_tool}}.",
        )
        .for_tools(&["apply_patch"])
        .with_code("must_read_first"),
        FeedbackRule::new(
            "invalid_patch_format",
            "FORMAT ERROR: {{patch_tool}} failed: invalid patch format.\n\
             ACTION: Provide a COMPLETE patch with *** Begin Patch and *** End Patch markers and valid context lines. \
             Re-read the target file and retry {{patch_tool}}.",
        )
        .for_tools(&["apply_patch"])
        .with_code("invalid_patch_format"),
        FeedbackRule::new(
            "unexpected_patch_line",
            "FORMAT ERROR: {{patch_tool}} failed: unexpected patch line.\n\
             ACTION: Ensure each line starts with ' ', '+', or '-' and include a valid @@ context header. \
             Re-read the target file and retry {{patch_tool}}.",
        )
        .for_tools(&["apply_patch"])
        .with_code("unexpected_patch_line"),
        FeedbackRule::new(
            "invalid_add_line",
            "FORMAT ERROR: {{patch_tool}} failed: invalid add line.\n\
             ACTION: Lines of an added file must start with '+'. Retry {{patch_tool}}.",
        )
        .for_tools(&["apply_patch"])
        .with_code("invalid_add_line"),
        FeedbackRule::new(
            "patch_noop",
            "NOTE: {{patch_tool}} applied but made NO changes to the file (no-op).\n\
             The file content is identical before and after your patch.\n\
             ACTION:\n\
             1. Call {{read_tool}}(path) to see current content\n\
             2. Create a NEW {{patch_tool}} that actually changes content\n\
             3. Or switch to {{edit_tool}}/{{write_tool}}\n\
             Do NOT repeat the same patch.",
        )
        .for_tools(&["apply_patch"])
        .on_noop(NoopLevel::First),
        FeedbackRule::new(
            "patch_repeated",
            "FORMAT ERROR: You submitted the exact same patch text again.\n\
             ACTION: {{read_tool}}(path), then create a DIFFERENT {{patch_tool}} or use {{edit_tool}}/{{write_tool}}.",
        )
        .for_tools(&["apply_patch"])
        .with_code("patch_repeated"),
        FeedbackRule::new(
            "patch_file_not_found",
            "FORMAT ERROR: {{patch_tool}} failed: file not found in patch header.\n\
             ACTION: Use {{ls_tool}}(path) or {{glob_tool}}(pattern, path) to locate the correct file path, \
             then retry {{patch_tool}} with the correct '*** Update File:' path.",
        )
        .for_tools(&["apply_patch"])
        .with_code("patch_file_not_found"),
        FeedbackRule::new(
            "must_read_before_editing",
            "FORMAT ERROR: {{edit_tool}} requires the file to be read first.\n\
             ACTION: Call {{read_tool}}(path) for {{target}} (use {{read_tool}}, NOT grep/search), then retry {{edit_tool}}.",
        )
        .for_tools(&["edit"])
        .with_code("must_read_first"),
        FeedbackRule::new(
            "old_string_not_found",
            "FORMAT ERROR: {{edit_tool}} failed: old text not found.\n\
             ACTION: Call {{read_tool}}(path) for {{target}} (use {{read_tool}}, NOT grep/search), \
             then retry with an EXACT substring (including whitespace), OR switch to {{patch_tool}} with exact context.",
        )
        .for_tools(&["edit"])
        .with_code("old_not_found"),
        FeedbackRule::new(
            "old_string_not_unique",
            "FORMAT ERROR: {{edit_tool}} failed: old text is not unique.\n\
             ACTION: Call {{read_tool}}(path) for {{target}} (use {{read_tool}}, NOT grep/search), \
             then retry with an exact unique substring, OR set all=true if you intend to replace all occurrences.",
        )
        .for_tools(&["edit"])
        .with_code("old_not_unique"),
        FeedbackRule::new(
            "old_equals_new",
            "NOTE: {{edit_tool}} called with old identical to new; no change would occur.\n\
             This usually means you want to MODIFY the code, not copy it unchanged.\n\
             ACTION:\n\
             1. Re-read the file with {{read_tool}} for {{target}}\n\
             2. Identify the EXACT text you want to CHANGE (old)\n\
             3. Write the MODIFIED version (new); it must be DIFFERENT from old\n\
             4. If the file already has correct content, the task may be complete; verify and move on.\n\
             TIP: For small files, consider using {{write_tool}} to rewrite the entire file.",
        )
        .for_tools(&["edit"])
        .on_noop(NoopLevel::First),
        FeedbackRule::new(
            "write_noop",
            "NOTE: {{write_tool}} wrote identical content (no-op).\n\
             ACTION: {{read_tool}}(path) (optionally diff=true), then {{write_tool}} with DIFFERENT content, \
             or use {{edit_tool}} for a targeted change. If already correct, stop.",
        )
        .for_tools(&["write"])
        .on_noop(NoopLevel::First),
        FeedbackRule::new(
            "write_missing_content",
            "FORMAT ERROR: {{write_tool}} requires both path and content.\n\
             ACTION: call {{write_tool}} with a complete JSON object containing both fields.\n\
             If this was an accidental duplicate call after a successful write, skip it and continue.",
        )
        .for_tools(&["write"])
        .with_code("missing_parameter"),
        FeedbackRule::new(
            "write_missing_content",
            "FORMAT ERROR: {{write_tool}} requires both path and content.\n\
             ACTION: call {{write_tool}} with a complete JSON object containing both fields.",
        )
        .for_tools(&["write"])
        .with_code("missing_content"),
        FeedbackRule::new(
            "read_is_directory",
            "FORMAT ERROR: {{read_tool}} failed: path is a directory.\n\
             ACTION: Use {{ls_tool}}(path) to list files, then call {{read_tool}} on a file path.",
        )
        .for_tools(&["read", "batch_read"])
        .with_code("is_directory"),
        FeedbackRule::new(
            "read_file_not_found",
            "FORMAT ERROR: {{read_tool}} failed: file not found.\n\
             ACTION: Use {{ls_tool}}(path) or {{glob_tool}}(pattern, path) to locate the correct file, \
             then call {{read_tool}} with the valid path.",
        )
        .for_tools(&["read", "batch_read"])
        .with_code("file_not_found"),
        FeedbackRule::new(
            "invalid_regex",
            "FORMAT ERROR: {{tool}} failed: invalid regex.\n\
             ACTION: If you want literal text, set literal_text=true. Otherwise escape regex metacharacters and retry {{tool}}.",
        )
        .for_tools(&["grep"])
        .with_code("invalid_regex"),
        FeedbackRule::new(
            "search_path_missing",
            "FORMAT ERROR: {{tool}} failed: path does not exist.\n\
             ACTION: Use {{ls_tool}}(path) or {{glob_tool}}(pattern, path) to find the correct path, then retry {{tool}}.",
        )
        .for_tools(&["grep"])
        .with_code("path_missing"),
        FeedbackRule::new(
            "ls_path_missing",
            "FORMAT ERROR: {{ls_tool}} failed: path does not exist.\n\
             ACTION: Use {{ls_tool}} with a valid path (e.g. '.') or use {{glob_tool}}(pattern, path) to discover files.",
        )
        .for_tools(&["ls"])
        .with_code("path_missing"),
        FeedbackRule::new(
            "glob_path_missing",
            "FORMAT ERROR: {{glob_tool}} failed: path does not exist.\n\
             ACTION: Use {{ls_tool}}(path) to verify directories, then retry {{glob_tool}} with a valid path.",
        )
        .for_tools(&["glob"])
        .with_code("path_missing"),
        FeedbackRule::new(
            "test_file_protected",
            "BLOCKED: {{path_value}} is a test file and must not be modified.\n\
             ACTION: change the implementation so the existing tests pass; leave test files untouched.",
        )
        .with_code("test_file_protected"),
        FeedbackRule::new(
            "sandbox_violation",
            "BLOCKED: {{tool}} tried to access a path outside the working directory.\n\
             ACTION: use paths relative to the working directory (no '..', no absolute paths elsewhere). \
             Use {{ls_tool}}('.') to see what is available.",
        )
        .with_kind(ErrorKind::SandboxViolation),
        FeedbackRule::new(
            "syntax_guard_rejection",
            "REJECTED: the change would break the syntax of {{path_value}}; the file was left unchanged.\n\
             ACTION: {{read_tool}} the file again and make a change that keeps brackets, quotes and blocks balanced.",
        )
        .with_kind(ErrorKind::SyntaxGuardRejection),
        FeedbackRule::new(
            "invalid_arguments",
            "FORMAT ERROR: {{tool}} was called with invalid arguments.\n\
             ACTION: use only the accepted parameters listed in the error and retry {{tool}} with corrected arguments.",
        )
        .with_kind(ErrorKind::ValidationError),
    ]
}

/// `tool_after` subscriber that renders the first matching rule
pub struct FeedbackHook {
    rules: Vec<FeedbackRule>,
    templates: Handlebars<'static>,
}

impl FeedbackHook {
    pub fn new(rules: Vec<FeedbackRule>) -> Self {
        debug!(rules = rules.len(), "FeedbackHook::new: called");
        let mut templates = Handlebars::new();
        // results are plain text, not HTML
        templates.register_escape_fn(handlebars::no_escape);
        Self { rules, templates }
    }

    /// Built-in table only
    pub fn standard() -> Self {
        Self::new(builtin_rules())
    }

    /// `extra` rules first, then the built-in table
    pub fn with_extra_rules(extra: Vec<FeedbackRule>) -> Self {
        let mut rules = extra;
        rules.extend(builtin_rules());
        Self::new(rules)
    }

    pub fn rules(&self) -> &[FeedbackRule] {
        &self.rules
    }

    /// Find the first matching rule and render its text
    ///
    /// Returns `(reason, text)`, or `None` when no rule applies.
    pub fn evaluate(&self, payload: &HookPayload) -> Result<Option<(String, String)>, HookError> {
        let Some(outcome) = Outcome::from_payload(payload) else {
            return Ok(None);
        };
        let Some(rule) = self.rules.iter().find(|r| r.matches(&outcome)) else {
            debug!(?outcome, "FeedbackHook::evaluate: no rule matched");
            return Ok(None);
        };
        debug!(reason = %rule.reason, "FeedbackHook::evaluate: rule matched");

        let vars = FeedbackVars::from_payload(payload);
        let mut text = self.render(rule, &rule.template, &vars)?;
        if let (Some(after), Some(repeat)) = (rule.repeat_after, &rule.repeat_template)
            && vars.attempt >= u64::from(after)
        {
            text.push('\n');
            text.push_str(&self.render(rule, repeat, &vars)?);
        }
        Ok(Some((rule.reason.clone(), text)))
    }

    fn render(&self, rule: &FeedbackRule, template: &str, vars: &FeedbackVars) -> Result<String, HookError> {
        self.templates
            .render_template(template, vars)
            .map_err(|e| HookError::Template {
                reason: rule.reason.clone(),
                message: e.to_string(),
            })
    }
}

impl Hook for FeedbackHook {
    fn name(&self) -> &str {
        "feedback"
    }

    fn on_event(&self, event: &str, payload: &HookPayload) -> Result<Option<HookPayload>, HookError> {
        if event != TOOL_AFTER {
            return Ok(None);
        }
        Ok(self.evaluate(payload)?.map(|(reason, text)| {
            payload
                .clone()
                .with("feedback_reason", reason)
                .with("feedback_text", text)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_payload(tool: &str, kind: ErrorKind, code: &str, path: &str) -> HookPayload {
        HookPayload::new()
            .with("tool_name", tool)
            .with("is_error", true)
            .with("error_kind", kind.as_str())
            .with("code", code)
            .with("path_value", path)
    }

    #[test]
    fn test_success_gets_no_feedback() {
        let hook = FeedbackHook::standard();
        let payload = HookPayload::new()
            .with("tool_name", "write")
            .with("is_error", false)
            .with("code", "created");
        assert!(hook.evaluate(&payload).unwrap().is_none());
    }

    #[test]
    fn test_old_not_found_renders_target() {
        let hook = FeedbackHook::standard();
        let payload = error_payload("edit", ErrorKind::NotFound, "old_not_found", "src/lib.rs");

        let (reason, text) = hook.evaluate(&payload).unwrap().unwrap();
        assert_eq!(reason, "old_string_not_found");
        assert!(text.contains("the SAME path you attempted to edit: src/lib.rs"));
        assert!(text.contains("switch to apply_patch"));
    }

    #[test]
    fn test_patch_second_failure_appends_repeat() {
        let hook = FeedbackHook::standard();
        let first = error_payload("apply_patch", ErrorKind::NotFound, "patch_context_not_found", "a.py")
            .with("attempt", 1u32);
        let (_, text) = hook.evaluate(&first).unwrap().unwrap();
        assert!(!text.contains("SECOND FAILURE"));

        let second = first.clone().with("attempt", 2u32);
        let (reason, text) = hook.evaluate(&second).unwrap().unwrap();
        assert_eq!(reason, "patch_context_not_found");
        assert!(text.ends_with("SECOND FAILURE on same file (a.py): STOP patching; re-read and switch to edit or write."));
    }

    #[test]
    fn test_only_first_noop_gets_feedback() {
        let hook = FeedbackHook::standard();
        let first = HookPayload::new()
            .with("tool_name", "write")
            .with("is_error", false)
            .with("code", "noop")
            .with("noop", "first")
            .with("path_value", "a.txt");
        let (reason, text) = hook.evaluate(&first).unwrap().unwrap();
        assert_eq!(reason, "write_noop");
        assert!(text.starts_with("NOTE:"));
        assert!(!text.contains("ERROR"));

        let repeated = first.with("noop", "repeated");
        assert!(hook.evaluate(&repeated).unwrap().is_none());
    }

    #[test]
    fn test_blocked_shell_command_gets_guidance() {
        let hook = FeedbackHook::standard();
        let payload = error_payload("shell", ErrorKind::SandboxViolation, "command_blocked", ".");
        let (reason, text) = hook.evaluate(&payload).unwrap().unwrap();
        assert_eq!(reason, "shell_command_blocked");
        assert!(text.contains("Pass workdir instead of cd"));
    }

    #[test]
    fn test_patch_without_path_names_header() {
        let hook = FeedbackHook::standard();
        let payload = error_payload("apply_patch", ErrorKind::NotFound, "patch_context_not_unique", "");
        let (_, text) = hook.evaluate(&payload).unwrap().unwrap();
        assert!(text.contains("'*** Update File: <path>'"));
    }

    #[test]
    fn test_fallback_by_kind() {
        let hook = FeedbackHook::standard();
        let payload = error_payload("read", ErrorKind::ValidationError, "invalid_limit", "a.txt");
        let (reason, text) = hook.evaluate(&payload).unwrap().unwrap();
        assert_eq!(reason, "invalid_arguments");
        assert!(text.starts_with("FORMAT ERROR: read was called"));

        let payload = error_payload("write", ErrorKind::SandboxViolation, "test_file_protected", "test_a.py");
        let (reason, _) = hook.evaluate(&payload).unwrap().unwrap();
        assert_eq!(reason, "test_file_protected");
    }

    #[test]
    fn test_extra_rules_take_precedence() {
        let custom = FeedbackRule::new("custom", "custom help for {{tool}}")
            .for_tools(&["edit"])
            .with_code("old_not_found");
        let hook = FeedbackHook::with_extra_rules(vec![custom]);
        let payload = error_payload("edit", ErrorKind::NotFound, "old_not_found", "a.txt");
        assert_eq!(
            hook.evaluate(&payload).unwrap(),
            Some(("custom".to_string(), "custom help for edit".to_string()))
        );
    }

    #[test]
    fn test_on_event_sets_feedback_fields() {
        let hook = FeedbackHook::standard();
        let payload = error_payload("grep", ErrorKind::ValidationError, "invalid_regex", ".");
        let out = hook.on_event(TOOL_AFTER, &payload).unwrap().unwrap();
        assert_eq!(out.str("feedback_reason"), Some("invalid_regex"));
        assert!(out.str("feedback_text").unwrap().contains("literal_text=true"));

        assert!(hook.on_event("turn_end", &payload).unwrap().is_none());
    }

    #[test]
    fn test_rule_parses_from_yaml() {
        let yaml = r#"
reason: edit_hint
tools: [edit]
kind: not_found
code: old_not_found
template: "read {{path_value}} first"
repeat-template: "still failing"
repeat-after: 3
"#;
        let rule: FeedbackRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.kind, Some(ErrorKind::NotFound));
        assert_eq!(rule.repeat_after, Some(3));

        let minimal: FeedbackRule = serde_yaml::from_str("reason: any\ntemplate: hi").unwrap();
        assert_eq!(minimal.tools, vec!["*"]);
    }
}
