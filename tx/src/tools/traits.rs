//! Tool trait definition and the tagged result type

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::context::ToolContext;
use super::contract::ToolContract;
use super::error::{ErrorKind, ToolError};

/// A tool that can be called by the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, aliases and parameter list
    fn contract(&self) -> ToolContract;

    /// Canonical tool name
    fn name(&self) -> &'static str {
        self.contract().name
    }

    /// Execute the tool with normalized arguments
    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;
}

/// Escalation level of a content-identical mutating call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoopLevel {
    First,
    Repeated,
}

impl NoopLevel {
    pub fn from_count(count: u32) -> Self {
        if count <= 1 { Self::First } else { Self::Repeated }
    }
}

/// Result of a tool execution
///
/// Only `text`, `is_error` and `error_kind` cross the wire. The remaining
/// fields are structured metadata for hooks and the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Outcome code such as `created`, `noop` or `old_not_found`
    #[serde(skip)]
    pub code: Option<String>,

    #[serde(skip)]
    pub noop: Option<NoopLevel>,

    /// Sandbox-relative path the call acted on
    #[serde(skip)]
    pub path: Option<String>,

    #[serde(skip)]
    pub feedback_reason: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(text: impl Into<String>) -> Self {
        debug!("ToolResult::success: called");
        Self {
            text: text.into(),
            is_error: false,
            error_kind: None,
            code: None,
            noop: None,
            path: None,
            feedback_reason: None,
        }
    }

    /// Create an error result from a tool error
    pub fn error(err: ToolError) -> Self {
        debug!(%err, "ToolResult::error: called");
        Self {
            text: format!("error: {}", err),
            is_error: true,
            error_kind: Some(err.kind()),
            code: Some(err.code().to_string()),
            noop: None,
            path: None,
            feedback_reason: None,
        }
    }

    /// Create a no-op result; never an error
    pub fn noop(text: impl Into<String>, level: NoopLevel) -> Self {
        debug!(?level, "ToolResult::noop: called");
        Self {
            noop: Some(level),
            code: Some("noop".to_string()),
            ..Self::success(text)
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn is_noop(&self) -> bool {
        self.noop.is_some()
    }

    /// Wire-shape JSON: `{ text, is_error, error_kind? }`
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "text": self.text, "is_error": self.is_error }))
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        Self::error(err)
    }
}
