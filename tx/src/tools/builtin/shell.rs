//! shell tool - run one allowlisted command inside the sandbox

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::config::ShellConfig;
use crate::tools::{ParamSpec, ParamType, Tool, ToolContext, ToolContract, ToolError, ToolKind, ToolResult};

use super::{arg_i64, arg_str, require_str};

/// Commands that are refused even when their binary is allowlisted
const DANGEROUS_PATTERNS: &[&str] = &[
    r"rm\s+(-[rf]+\s+)*(/|~|\$HOME|/\*)",
    r"rm\s+.*\s+(/etc|/usr|/bin|/lib|/boot|/var|/sys|/proc)",
    r"(mv|cp)\s+.*\s+(/etc|/usr|/bin|/lib|/boot)/",
    r"dd\s+.*of=/dev/",
    r"mkfs\.",
    r"^sudo\s+",
    r"^su\s+",
    r"chmod\s+(-R\s+)?(777|666)\s+/",
    r";\s*(rm|mv|dd|mkfs|sudo|su)\s+",
    r"\|\s*(rm|mv|dd|mkfs|sudo|su)\s+",
    r":\(\)\s*\{",
    r"(curl|wget).*\|\s*(ba)?sh",
    r"(\d\s*)?>{1,2}\s*/(etc|usr|bin|lib|boot|var|sys|proc)/",
    r"tee\b.*\s+/(etc|usr|bin|lib|boot)/",
];

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("invalid shell filter regex {}: {}", pattern, err),
    }
}

static DANGEROUS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| DANGEROUS_PATTERNS.iter().map(|p| compile(&format!("(?i){}", p))).collect());

static CHAINING: LazyLock<Regex> = LazyLock::new(|| compile(r";|&&|\|\||`|\n|\r|\$\(|(^|\s)\.\./"));

static CD: LazyLock<Regex> = LazyLock::new(|| compile(r"^\s*cd\b"));

static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(^|\s)(python[0-9.]*\s+-[a-zA-Z]*c|node\s+(-e|--eval|-p|--print)|perl\s+-[a-zA-Z]*e|ruby\s+-[a-zA-Z]*e|(ba|z)?sh\s+-c)",
    )
});

static ENV_ASSIGN: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z_][A-Za-z0-9_]*="));

static TEST_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\b(run tests?|tests?|npm test|jest|pytest|go test|cargo test|ctest|yarn test|pnpm test)\b")
});

/// A command that passed the filters, split into program, arguments and env
#[derive(Debug, PartialEq)]
struct Invocation {
    env: Vec<(String, String)>,
    program: String,
    args: Vec<String>,
}

fn blocked(reason: impl Into<String>) -> ToolError {
    ToolError::CommandBlocked { reason: reason.into() }
}

/// Run every filter over a command line and split it into an invocation
fn check_command(command: &str, config: &ShellConfig) -> Result<Invocation, ToolError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(ToolError::validation("missing_parameter", "command must not be empty"));
    }
    if config.block_test_commands && TEST_MENTION.is_match(command) {
        return Err(blocked("running tests is not allowed from the shell tool"));
    }
    if DANGEROUS.iter().any(|re| re.is_match(command)) {
        return Err(blocked("command matches a dangerous pattern"));
    }
    if CHAINING.is_match(command) {
        return Err(blocked(
            "chaining, subshells, newlines and '../' paths are not allowed; run one command at a time",
        ));
    }
    if CD.is_match(command) {
        return Err(blocked("cd is not allowed; pass workdir instead"));
    }
    if INLINE_CODE.is_match(command) {
        return Err(blocked("inline code flags (python -c, node -e, sh -c) are not allowed; write a script file instead"));
    }

    let tokens = shell_words::split(command)
        .map_err(|e| ToolError::validation("invalid_command", format!("could not parse command: {}", e)))?;
    if tokens.iter().any(|t| t == "|") {
        return Err(blocked("pipes are not allowed; run one command at a time"));
    }

    let mut env = Vec::new();
    let mut rest = tokens.into_iter().peekable();
    while let Some(token) = rest.next_if(|t| ENV_ASSIGN.is_match(t)) {
        if let Some((key, value)) = token.split_once('=') {
            env.push((key.to_string(), value.to_string()));
        }
    }

    let program = rest
        .next()
        .ok_or_else(|| ToolError::validation("invalid_command", "command has no program to run"))?;
    if program.contains('/') {
        return Err(blocked(format!("{} is a path; use a bare command name from the allowlist", program)));
    }
    if !config.allowed_commands.iter().any(|c| *c == program) {
        return Err(blocked(format!(
            "{} is not in the allowed commands: {}",
            program,
            config.allowed_commands.join(", ")
        )));
    }

    Ok(Invocation {
        env,
        program,
        args: rest.collect(),
    })
}

/// Keep the head and tail of long output
fn cap_output(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let half = max_chars / 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = text.chars().skip(total - half).collect();
    format!("{}\n...[truncated {} chars]...\n{}", head, total - 2 * half, tail)
}

/// Clamp the requested timeout; zero or negative means the default
fn effective_timeout(requested: Option<i64>, config: &ShellConfig) -> u64 {
    match requested {
        Some(ms) if ms > 0 => (ms as u64).min(config.max_timeout_ms),
        _ => config.default_timeout_ms,
    }
}

/// Run a single allowlisted command inside the sandbox
pub struct ShellTool;

impl ShellTool {
    async fn run(&self, input: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let config = &ctx.config().shell;
        let command = require_str(input, "command")?;
        let invocation = check_command(command, config)?;
        debug!(?invocation, "ShellTool::run: command allowed");

        let (workdir, workdir_relative) = match arg_str(input, "workdir").filter(|w| !w.trim().is_empty()) {
            Some(requested) => {
                let resolved = ctx.resolve(requested, true)?;
                if !resolved.path.is_dir() {
                    return Err(ToolError::validation(
                        "not_a_directory",
                        format!("workdir {} is not a directory", resolved.relative),
                    ));
                }
                (resolved.path, resolved.relative)
            }
            None => (ctx.root().to_path_buf(), ".".to_string()),
        };

        let timeout_ms = effective_timeout(arg_i64(input, "timeout_ms"), config);
        debug!(%timeout_ms, %workdir_relative, "ShellTool::run: spawning command");

        let child = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(Duration::from_millis(timeout_ms), child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::not_found(
                    "command_not_found",
                    format!("{} is allowed but not installed", invocation.program),
                ));
            }
            Ok(Err(e)) => return Err(ToolError::io(format!("failed to run {}", invocation.program), e)),
            Err(_) => {
                debug!(%timeout_ms, "ShellTool::run: command timed out");
                return Err(ToolError::CommandTimedOut { timeout_ms });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut text = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]\n");
            text.push_str(stderr.trim_end());
        }
        if text.is_empty() {
            text = "(empty output)".to_string();
        }
        let text = cap_output(&text, config.max_output_chars);

        if output.status.success() {
            debug!("ShellTool::run: command succeeded");
            Ok(ToolResult::success(text).with_path(workdir_relative))
        } else {
            let exit_code = output.status.code().unwrap_or(-1);
            debug!(%exit_code, "ShellTool::run: command failed");
            Err(ToolError::CommandFailed { exit_code, output: text })
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn contract(&self) -> ToolContract {
        ToolContract {
            name: "shell",
            description: "Run one allowlisted command (no pipes, chaining, cd or inline code) inside the sandbox. Use workdir instead of cd.",
            aliases: &["run_shell", "shell_exec", "exec_command"],
            params: vec![
                ParamSpec::required("command", ParamType::String, "Command line to run").aliases(&["cmd", "script"]),
                ParamSpec::optional("workdir", ParamType::String, "Directory to run in (default: sandbox root)")
                    .aliases(&["cwd", "dir", "directory"]),
                ParamSpec::optional("timeout_ms", ParamType::Integer, "Timeout in milliseconds").aliases(&["timeout"]),
            ],
            kind: ToolKind::Mutating,
            example: r#"{"command": "git status --short", "workdir": "."}"#,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ShellTool::execute: called");
        match self.run(&input, ctx).await {
            Ok(result) => result,
            Err(e) => {
                debug!(%e, "ShellTool::execute: failed");
                let path = arg_str(&input, "workdir").unwrap_or(".").to_string();
                ToolResult::error(e).with_path(path)
            }
        }
    }
}
