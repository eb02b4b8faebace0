//! tx - sandboxed tool execution for coding agents
//!
//! CLI entry point for listing tools, running single calls and replaying
//! recorded turns.

use std::fs::{self, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use serde_json::{Value, json};
use tracing::{debug, info};

use toolexec::cli::{Cli, Command, get_log_path};
use toolexec::{Config, ToolCall, ToolContext, ToolExecutor};

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: RUST_LOG directives, then CLI --log-level, then config, then INFO
    let level = parse_level(cli_log_level.or(config_log_level));
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let log_path = get_log_path();
    let log_file = log_path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&log_path));

    match log_file {
        Ok(file) => tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init(),
        Err(e) => {
            eprintln!("Warning: cannot open {} ({}), logging to stderr", log_path.display(), e);
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    info!(root = %root.display(), "tx starting");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Tools => cmd_tools(&config),
        Command::Exec { name, arguments } => cmd_exec(&config, &root, &name, arguments).await,
        Command::Run { file, session_id } => cmd_run(&config, &root, &file, session_id).await,
    }
}

fn cmd_tools(config: &Config) -> Result<()> {
    debug!("cmd_tools: called");
    let executor = ToolExecutor::standard(config);
    let definitions = serde_json::to_string_pretty(&executor.definitions())?;
    println!("{}", definitions);
    Ok(())
}

fn open_context(config: &Config, root: &Path, session_id: Option<String>) -> Result<ToolContext> {
    let ctx = match session_id {
        Some(id) => ToolContext::with_session_id(root, config.clone(), id),
        None => ToolContext::new(root, config.clone()),
    };
    ctx.context(format!("Failed to open sandbox at {}", root.display()))
}

async fn cmd_exec(config: &Config, root: &Path, name: &str, arguments: Option<String>) -> Result<()> {
    debug!(%name, "cmd_exec: called");
    let raw = match arguments {
        Some(text) => text,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("Failed to read arguments from stdin")?;
            text
        }
    };
    let call = if raw.trim().is_empty() {
        ToolCall::new(name, json!({}))
    } else {
        ToolCall::raw(name, raw)
    };

    let executor = ToolExecutor::standard(config);
    let ctx = open_context(config, root, None)?;
    let result = executor.execute(&call, &ctx).await;
    executor.end_turn(&ctx).await;

    println!("{}", serde_json::to_string(&result.to_wire())?);
    if result.is_error {
        std::process::exit(1);
    }
    Ok(())
}

/// A line is either one call object or an array of calls
fn parse_turn(line: &str) -> Result<Vec<ToolCall>> {
    let value: Value = serde_json::from_str(line)?;
    let calls = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        Value::Object(_) => vec![serde_json::from_value(value)?],
        other => return Err(eyre!("expected a call object or array of calls, got {}", other)),
    };
    Ok(calls)
}

async fn cmd_run(config: &Config, root: &Path, file: &PathBuf, session_id: Option<String>) -> Result<()> {
    debug!(?file, "cmd_run: called");
    let content = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;

    let executor = ToolExecutor::standard(config);
    let ctx = open_context(config, root, session_id)?;

    let mut turns = 0u64;
    let mut errors = 0u64;
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let calls = parse_turn(line).context(format!("{}:{}: invalid turn", file.display(), index + 1))?;
        turns += 1;

        let report = executor.execute_all(&calls, &ctx).await;
        for (call, (id, result)) in calls.iter().zip(&report.results) {
            let marker = if result.is_error {
                errors += 1;
                "✗".red()
            } else {
                "✓".green()
            };
            eprintln!("{} {} {}", marker, call.name.cyan(), id.dimmed());
            let line = json!({ "turn": turns, "id": id, "name": call.name, "result": result.to_wire() });
            println!("{}", serde_json::to_string(&line)?);
        }

        if let Some(stop) = report.stop {
            eprintln!(
                "{} {} after {} no-op turns",
                "stopped:".yellow(),
                stop.reason,
                stop.consecutive_noop_turns
            );
            break;
        }
    }

    eprintln!("{} turns, {} errors", turns.to_string().bold(), errors.to_string().bold());
    Ok(())
}
