//! Tool system
//!
//! Every call is scoped to a `ToolContext`: one sandbox root, one session.
//! Tools cannot escape the sandbox, and every failure is reported as a
//! `ToolResult` with `is_error` set rather than propagated.

mod context;
mod contract;
mod error;
mod executor;
mod sandbox;
mod traits;

pub mod builtin;

pub use builtin::{
    ApplyPatchTool, BatchReadTool, EditFileTool, GlobTool, GrepTool, ListDirectoryTool, ReadFileTool, ShellTool,
    WriteFileTool,
};
pub use context::ToolContext;
pub use contract::{ContractTable, ParamSpec, ParamType, ToolContract, ToolDefinition, ToolKind};
pub use error::{ErrorKind, ToolError};
pub use executor::{ToolExecutor, TurnReport};
pub use sandbox::{ResolvedPath, Sandbox, SandboxError};
pub use traits::{NoopLevel, Tool, ToolResult};
