//! toolexec - sandboxed tool execution for coding agents
//!
//! A model proposes tool calls; this crate turns them into safe, bounded
//! filesystem operations and returns structured results.
//!
//! # Modules
//!
//! - [`normalize`] - tool-name resolution, JSON repair, alias remapping, coercion
//! - [`tools`] - the tool trait, built-in tools, sandbox and executor
//! - [`patch`] - structured patch parsing and tiered hunk matching
//! - [`session`] - per-session state and snapshot persistence
//! - [`hooks`] - hook bus, feedback rules, metrics and event logging
//! - [`syntax`] - bracket/quote balance guard for edits
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod hooks;
pub mod normalize;
pub mod patch;
pub mod session;
pub mod syntax;
pub mod tools;

pub use config::Config;
pub use normalize::{DispatchedCall, ToolCall};
pub use session::{SessionState, StopSignal};
pub use tools::{ErrorKind, ToolContext, ToolError, ToolExecutor, ToolResult, TurnReport};
