//! ToolContext - execution context shared by every call of one session

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::session::SessionState;

use super::ToolError;
use super::sandbox::{ResolvedPath, Sandbox};

/// Execution context for tools - scoped to one session and one sandbox root
///
/// Cloning is cheap; clones share the session state and the mutation lock.
#[derive(Clone)]
pub struct ToolContext {
    sandbox: Arc<Sandbox>,
    config: Arc<Config>,
    session: Arc<Mutex<SessionState>>,

    /// Held by mutating calls so only one runs at a time
    mutation_lock: Arc<Mutex<()>>,
}

impl ToolContext {
    /// Create a context with a fresh session
    pub fn new(root: impl AsRef<Path>, config: Config) -> Result<Self, ToolError> {
        let session_id = Uuid::now_v7().to_string();
        Self::with_session_id(root, config, session_id)
    }

    pub fn with_session_id(root: impl AsRef<Path>, config: Config, session_id: impl Into<String>) -> Result<Self, ToolError> {
        let root = root.as_ref();
        debug!(?root, "ToolContext::with_session_id: called");
        let sandbox = Sandbox::new(root, &config.sandbox)?;
        let state = SessionState::new(session_id, config.limits.version_cache_size);
        Ok(Self::from_parts(sandbox, config, state))
    }

    /// Assemble a context from an existing sandbox and session, e.g. one restored from a snapshot
    pub fn from_parts(sandbox: Sandbox, config: Config, state: SessionState) -> Self {
        debug!(root = ?sandbox.root(), session = %state.id(), "ToolContext::from_parts: called");
        Self {
            sandbox: Arc::new(sandbox),
            config: Arc::new(config),
            session: Arc::new(Mutex::new(state)),
            mutation_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lock the session state for the duration of the guard
    pub async fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().await
    }

    /// Serialize mutating calls against this sandbox
    pub async fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutation_lock.lock().await
    }

    /// Resolve a path inside the sandbox
    pub fn resolve(&self, path: &str, must_exist: bool) -> Result<ResolvedPath, ToolError> {
        Ok(self.sandbox.resolve(path, must_exist)?)
    }

    /// Reject writes to test files unless the override is set
    pub fn guard_test_file(&self, resolved: &ResolvedPath) -> Result<(), ToolError> {
        if !self.config.sandbox.allow_test_edits && self.sandbox.is_test_file(&resolved.path) {
            debug!(path = %resolved.relative, "ToolContext::guard_test_file: blocked");
            return Err(ToolError::TestFileProtected {
                path: resolved.relative.clone(),
            });
        }
        Ok(())
    }

    /// Enforce the optional read-before-edit policy for an existing file
    pub async fn guard_read_before_edit(&self, resolved: &ResolvedPath, verb: &str) -> Result<(), ToolError> {
        if !self.config.escalation.require_read_before_edit || !resolved.exists() {
            return Ok(());
        }
        if self.session().await.was_seen(&resolved.path) {
            return Ok(());
        }
        debug!(path = %resolved.relative, "ToolContext::guard_read_before_edit: file not read");
        Err(ToolError::validation(
            "must_read_first",
            format!("must read {} before {}. Call read first to see its current content.", resolved.relative, verb),
        ))
    }

    /// Sandbox-relative display form of an absolute path
    pub fn display(&self, path: &Path) -> String {
        self.sandbox.relative(path)
    }

    /// Absolute path for a sandbox-relative display path
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.sandbox.root().join(relative)
    }
}
