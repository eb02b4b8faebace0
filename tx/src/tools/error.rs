//! Tool error types and the error-kind taxonomy carried on every result

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure class reported alongside `is_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Path escapes the sandbox root or touches a protected file
    SandboxViolation,
    /// Malformed or missing arguments after repair
    ValidationError,
    /// Target file, snippet or patch context is absent
    NotFound,
    /// Snippet or patch context matches more than once
    AmbiguousMatch,
    /// Edit would have broken a previously valid file
    SyntaxGuardRejection,
    /// I/O or other unexpected failure
    InternalFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SandboxViolation => "sandbox_violation",
            Self::ValidationError => "validation_error",
            Self::NotFound => "not_found",
            Self::AmbiguousMatch => "ambiguous_match",
            Self::SyntaxGuardRejection => "syntax_guard_rejection",
            Self::InternalFailure => "internal_failure",
        }
    }

    /// Fatal kinds are never worth retrying with the same arguments
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SandboxViolation | Self::InternalFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sandbox_violation" => Ok(Self::SandboxViolation),
            "validation_error" => Ok(Self::ValidationError),
            "not_found" => Ok(Self::NotFound),
            "ambiguous_match" => Ok(Self::AmbiguousMatch),
            "syntax_guard_rejection" => Ok(Self::SyntaxGuardRejection),
            "internal_failure" => Ok(Self::InternalFailure),
            other => Err(format!("unknown error kind: {}", other)),
        }
    }
}

/// Errors that can occur during tool execution
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("path {path} escapes sandbox root {root}")]
    SandboxViolation { path: String, root: PathBuf },

    #[error("{path} is a test file and cannot be modified")]
    TestFileProtected { path: String },

    #[error("missing tool name")]
    MissingToolName,

    #[error("unknown tool '{name}'. Available tools: {available}")]
    UnknownTool { name: String, available: String },

    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{message}")]
    Ambiguous { code: &'static str, message: String },

    #[error("edit rejected: {path} would no longer parse as {language} ({reason}). The file was left unchanged.")]
    SyntaxRejected {
        path: String,
        language: &'static str,
        reason: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command blocked by sandbox: {reason}")]
    CommandBlocked { reason: String },

    #[error("command exited with code {exit_code}\n{output}")]
    CommandFailed { exit_code: i32, output: String },

    #[error("command timed out after {timeout_ms} ms")]
    CommandTimedOut { timeout_ms: u64 },

    #[error("internal failure: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn ambiguous(code: &'static str, message: impl Into<String>) -> Self {
        Self::Ambiguous {
            code,
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SandboxViolation { .. } | Self::TestFileProtected { .. } | Self::CommandBlocked { .. } => {
                ErrorKind::SandboxViolation
            }
            Self::MissingToolName | Self::UnknownTool { .. } | Self::Validation { .. } => ErrorKind::ValidationError,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Ambiguous { .. } => ErrorKind::AmbiguousMatch,
            Self::SyntaxRejected { .. } => ErrorKind::SyntaxGuardRejection,
            Self::Io { .. } | Self::CommandFailed { .. } | Self::CommandTimedOut { .. } | Self::Internal(_) => {
                ErrorKind::InternalFailure
            }
        }
    }

    /// Fine-grained outcome code used by feedback rules
    pub fn code(&self) -> &'static str {
        match self {
            Self::SandboxViolation { .. } => "sandbox_violation",
            Self::TestFileProtected { .. } => "test_file_protected",
            Self::MissingToolName => "missing_tool_name",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::Validation { code, .. } | Self::NotFound { code, .. } | Self::Ambiguous { code, .. } => code,
            Self::SyntaxRejected { .. } => "syntax_guard_rejection",
            Self::Io { .. } => "io_error",
            Self::CommandBlocked { .. } => "command_blocked",
            Self::CommandFailed { .. } => "command_failed",
            Self::CommandTimedOut { .. } => "command_timeout",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_violation_message() {
        let err = ToolError::SandboxViolation {
            path: "/etc/passwd".to_string(),
            root: PathBuf::from("/tmp/sandbox"),
        };

        let msg = err.to_string();
        assert!(msg.contains("/etc/passwd"));
        assert!(msg.contains("/tmp/sandbox"));
        assert_eq!(err.kind(), ErrorKind::SandboxViolation);
        assert!(err.kind().is_fatal());
    }

    #[test]
    fn test_codes_follow_variant() {
        let err = ToolError::ambiguous("old_not_unique", "found 2 times");
        assert_eq!(err.kind(), ErrorKind::AmbiguousMatch);
        assert_eq!(err.code(), "old_not_unique");

        let err = ToolError::TestFileProtected {
            path: "tests/a.rs".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::SandboxViolation);
        assert_eq!(err.code(), "test_file_protected");

        let err = ToolError::CommandBlocked {
            reason: "pipes are not allowed".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::SandboxViolation);
        assert_eq!(err.code(), "command_blocked");

        let err = ToolError::CommandFailed {
            exit_code: 2,
            output: "boom".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::InternalFailure);
        assert_eq!(err.to_string(), "command exited with code 2\nboom");
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::SyntaxGuardRejection).unwrap();
        assert_eq!(json, "\"syntax_guard_rejection\"");
        let back: ErrorKind = "not_found".parse().unwrap();
        assert_eq!(back, ErrorKind::NotFound);
    }
}
