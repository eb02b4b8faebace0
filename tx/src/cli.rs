//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// tx - run agent tool calls against a sandboxed directory
#[derive(Parser)]
#[command(
    name = "tx",
    about = "Sandboxed tool-execution engine for coding agents",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Sandbox root; every path is resolved inside it
    #[arg(short, long, global = true, help = "Sandbox root directory (default: current directory)")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the tool definitions as JSON
    Tools,

    /// Run one tool call and print the result
    Exec {
        /// Tool name or alias
        name: String,

        /// Arguments as JSON; read from stdin when omitted
        #[arg(value_name = "JSON")]
        arguments: Option<String>,
    },

    /// Replay a JSONL file of turns through one session
    Run {
        /// One JSON array of calls (or a single call) per line
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Session id used for snapshots and logs
        #[arg(long)]
        session_id: Option<String>,
    },
}

/// Default log file location
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolexec")
        .join("logs")
        .join("toolexec.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_exec_with_globals() {
        let cli = Cli::try_parse_from(["tx", "--root", "/tmp/work", "exec", "read", r#"{"path": "a.txt"}"#]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/work")));
        match cli.command {
            Command::Exec { name, arguments } => {
                assert_eq!(name, "read");
                assert_eq!(arguments.as_deref(), Some(r#"{"path": "a.txt"}"#));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_log_path_ends_with_file_name() {
        assert!(get_log_path().ends_with("toolexec/logs/toolexec.log"));
    }
}
