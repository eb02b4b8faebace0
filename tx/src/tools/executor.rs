//! ToolExecutor - normalizes, dispatches and observes tool calls for a session

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::hooks::{
    EventLogHook, FeedbackHook, HookBus, HookPayload, MetricsHook, MetricsSnapshot, SESSION_STOP, TOOL_AFTER,
    TOOL_BEFORE, TURN_END, panic_message,
};
use crate::normalize::{DispatchedCall, ToolCall, normalize_arguments, normalize_call, resolve_tool};
use crate::session::{SessionStore, StopSignal};

use super::builtin::{
    ApplyPatchTool, BatchReadTool, EditFileTool, GlobTool, GrepTool, ListDirectoryTool, ReadFileTool, ShellTool,
    WriteFileTool,
};
use super::{ContractTable, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// Outcome of one batch of calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    /// `(call id, result)` in call order
    pub results: Vec<(String, ToolResult)>,

    /// Set once the session should end
    pub stop: Option<StopSignal>,
}

impl TurnReport {
    pub fn should_stop(&self) -> bool {
        self.stop.is_some()
    }
}

/// Manages tool execution for a session
pub struct ToolExecutor {
    tools: HashMap<&'static str, Box<dyn Tool>>,
    contracts: ContractTable,
    hooks: HookBus,
    metrics: Option<Arc<MetricsHook>>,
    store: Option<SessionStore>,
}

impl ToolExecutor {
    /// All built-in tools plus the hooks enabled by `config`
    pub fn standard(config: &Config) -> Self {
        debug!("ToolExecutor::standard: called");
        let mut executor = Self::empty();

        executor.add_tool(Box::new(ReadFileTool));
        executor.add_tool(Box::new(BatchReadTool));
        executor.add_tool(Box::new(WriteFileTool));
        executor.add_tool(Box::new(EditFileTool));
        executor.add_tool(Box::new(ApplyPatchTool));
        executor.add_tool(Box::new(GlobTool));
        executor.add_tool(Box::new(GrepTool));
        executor.add_tool(Box::new(ListDirectoryTool));
        if config.shell.enabled {
            executor.add_tool(Box::new(ShellTool));
        }

        // feedback first so later subscribers see feedback_reason
        if config.feedback.enabled {
            let feedback = FeedbackHook::with_extra_rules(config.feedback.rules.clone());
            executor.hooks.register(TOOL_AFTER, Arc::new(feedback));
        }

        let metrics = Arc::new(MetricsHook::new());
        executor.hooks.register_all(metrics.clone());
        executor.metrics = Some(metrics);

        if let Some(path) = &config.session.log_events {
            match EventLogHook::open(path) {
                Ok(hook) => executor.hooks.register_all(Arc::new(hook)),
                Err(e) => warn!(?path, error = %e, "ToolExecutor::standard: event log disabled"),
            }
        }

        if let Some(dir) = &config.session.store_dir {
            match SessionStore::open(dir) {
                Ok(store) => executor.store = Some(store),
                Err(e) => warn!(?dir, error = %e, "ToolExecutor::standard: session store disabled"),
            }
        }

        executor
    }

    /// Create an empty executor with no tools or hooks (for testing)
    pub fn empty() -> Self {
        debug!("ToolExecutor::empty: called");
        Self {
            tools: HashMap::new(),
            contracts: ContractTable::new(),
            hooks: HookBus::new(),
            metrics: None,
            store: None,
        }
    }

    /// Add a tool to the executor
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        let contract = tool.contract();
        debug!(tool_name = contract.name, "ToolExecutor::add_tool: called");
        self.tools.insert(contract.name, tool);
        self.contracts.insert(contract);
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookBus {
        &mut self.hooks
    }

    pub fn contracts(&self) -> &ContractTable {
        &self.contracts
    }

    /// Counters from the metrics hook, when installed
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }

    /// Get tool definitions for the model, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        debug!("ToolExecutor::definitions: called");
        self.contracts.iter().map(ToolDefinition::from).collect()
    }

    /// Check if a tool exists under its canonical name or an alias
    pub fn has_tool(&self, name: &str) -> bool {
        resolve_tool(name, &self.contracts).is_ok()
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.contracts.names()
    }

    fn is_read_only(&self, call: &ToolCall) -> bool {
        resolve_tool(&call.name, &self.contracts).is_ok_and(|c| !c.is_mutating())
    }

    /// Execute a tool call
    ///
    /// Never fails: every problem, including a panicking tool, comes back as an
    /// error result.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        debug!(tool_name = %call.name, tool_id = %call.id, "ToolExecutor::execute: called");
        let dispatched = normalize_call(call, &self.contracts);
        let tool_name = match resolve_tool(&call.name, &self.contracts) {
            Ok(contract) => contract.name.to_string(),
            Err(_) => call.name.trim().to_string(),
        };
        let (session_id, turn) = {
            let session = ctx.session().await;
            (session.id().to_string(), session.turn())
        };

        let (arguments, repairs) = match &dispatched {
            Ok(d) => (
                Value::Object(d.arguments().clone()),
                serde_json::to_value(d.repairs()).unwrap_or_else(|_| json!([])),
            ),
            Err(_) => (call.arguments.clone(), json!([])),
        };
        let before = self.hooks.emit(
            TOOL_BEFORE,
            HookPayload::new()
                .with("session_id", session_id.clone())
                .with("call_id", call.id.clone())
                .with("tool_name", tool_name.clone())
                .with("raw_name", call.name.clone())
                .with("arguments", arguments.clone())
                .with("repairs", repairs)
                .with("turn", turn),
        );

        let mut result = match dispatched {
            Err(e) => {
                debug!(%e, "ToolExecutor::execute: normalization failed");
                ToolResult::error(e)
            }
            Ok(d) => match self.rewritten_arguments(&d, &arguments, before.get("arguments")) {
                Ok(input) => self.run(d.name(), Value::Object(input), ctx).await,
                Err(e) => ToolResult::error(e),
            },
        };

        let (patch_fail_count, attempt) = {
            let mut session = ctx.session().await;
            session.record_call(&tool_name, result.is_error);
            let failures = result
                .path
                .as_deref()
                .map_or(0, |p| session.patch_failures(&ctx.absolute(p)));
            let attempt = if tool_name == "apply_patch" {
                u64::from(failures)
            } else {
                session.error_count(&tool_name)
            };
            (failures, attempt)
        };

        let path_value = result
            .path
            .clone()
            .or_else(|| arguments.get("path").and_then(Value::as_str).map(str::to_string));
        let after = self.hooks.emit(
            TOOL_AFTER,
            HookPayload::new()
                .with("session_id", session_id)
                .with("call_id", call.id.clone())
                .with("tool_name", tool_name)
                .with("raw_name", call.name.clone())
                .with("arguments", arguments)
                .with("text", result.text.clone())
                .with("is_error", result.is_error)
                .with("error_kind", result.error_kind.map(|k| k.as_str()))
                .with("code", result.code.clone())
                .with("noop", serde_json::to_value(result.noop).unwrap_or(Value::Null))
                .with("path_value", path_value)
                .with("patch_fail_count", patch_fail_count)
                .with("attempt", attempt)
                .with("turn", turn),
        );

        if let Some(feedback) = after.str("feedback_text").filter(|t| !t.trim().is_empty()) {
            result.text = format!("{}\n\n{}", result.text.trim_end(), feedback);
            result.feedback_reason = after.str("feedback_reason").map(str::to_string);
        }
        result
    }

    /// Re-run normalization when a `tool_before` hook replaced the arguments
    fn rewritten_arguments(
        &self,
        dispatched: &DispatchedCall,
        original: &Value,
        hooked: Option<&Value>,
    ) -> Result<Map<String, Value>, ToolError> {
        match hooked {
            Some(value) if value != original => {
                debug!(tool_name = dispatched.name(), "ToolExecutor::rewritten_arguments: arguments replaced by hook");
                let contract = self
                    .contracts
                    .get(dispatched.name())
                    .ok_or_else(|| ToolError::Internal(format!("no contract for {}", dispatched.name())))?;
                let (arguments, _) = normalize_arguments(value, contract)?;
                Ok(arguments)
            }
            _ => Ok(dispatched.arguments().clone()),
        }
    }

    /// Run one normalized call; mutating tools hold the session write lock
    async fn run(&self, name: &'static str, input: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::error(ToolError::Internal(format!("tool {} is not registered", name)));
        };
        let mutating = self.contracts.get(name).is_some_and(|c| c.is_mutating());
        let _guard = if mutating { Some(ctx.lock_mutations().await) } else { None };

        match AssertUnwindSafe(tool.execute(input, ctx)).catch_unwind().await {
            Ok(result) => {
                if result.is_error {
                    debug!(tool_name = name, code = ?result.code, "ToolExecutor::run: tool reported error");
                } else if let (Some(path), Some(code)) = (&result.path, &result.code)
                    && (code == "created" || code == "overwritten" || code == "replaced" || code == "applied")
                {
                    info!(tool_name = name, %path, %code, "ToolExecutor::run: file changed");
                }
                result
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool_name = name, %message, "ToolExecutor::run: tool panicked");
                ToolResult::error(ToolError::Internal(format!("tool {} panicked: {}", name, message)))
            }
        }
    }

    /// Execute one turn of calls and close the turn
    ///
    /// Consecutive read-only calls run concurrently; mutating calls run one at
    /// a time in the order given.
    pub async fn execute_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> TurnReport {
        debug!(count = %tool_calls.len(), "ToolExecutor::execute_all: called");
        let mut results = Vec::with_capacity(tool_calls.len());

        let mut i = 0;
        while i < tool_calls.len() {
            if self.is_read_only(&tool_calls[i]) {
                let start = i;
                while i < tool_calls.len() && self.is_read_only(&tool_calls[i]) {
                    i += 1;
                }
                let batch = &tool_calls[start..i];
                debug!(size = batch.len(), "ToolExecutor::execute_all: running read-only batch");
                let outputs = join_all(batch.iter().map(|call| self.execute(call, ctx))).await;
                results.extend(batch.iter().map(|call| call.id.clone()).zip(outputs));
            } else {
                let call = &tool_calls[i];
                results.push((call.id.clone(), self.execute(call, ctx).await));
                i += 1;
            }
        }

        let stop = self.end_turn(ctx).await;
        debug!(stop = stop.is_some(), "ToolExecutor::execute_all: completed all tools");
        TurnReport { results, stop }
    }

    /// Close the current turn, emit `turn_end`, and persist a snapshot
    pub async fn end_turn(&self, ctx: &ToolContext) -> Option<StopSignal> {
        let limit = ctx.config().escalation.noop_turn_limit;
        let (already_stopped, streak_before, stop, turn, streak, snapshot) = {
            let mut session = ctx.session().await;
            let already_stopped = session.should_stop();
            let streak_before = session.consecutive_noop_turns();
            let stop = session.end_turn(limit);
            let snapshot = self.store.as_ref().map(|_| session.snapshot());
            (
                already_stopped,
                streak_before,
                stop,
                session.turn(),
                session.consecutive_noop_turns(),
                snapshot,
            )
        };

        self.hooks.emit(
            TURN_END,
            HookPayload::new()
                .with("turn", turn)
                .with("noop_only", streak > streak_before)
                .with("consecutive_noop_turns", streak),
        );

        if !already_stopped && let Some(signal) = &stop {
            info!(turn, reason = %signal.reason, "ToolExecutor::end_turn: session stop");
            self.hooks.emit(
                SESSION_STOP,
                HookPayload::new()
                    .with("reason", signal.reason.clone())
                    .with("consecutive_noop_turns", signal.consecutive_noop_turns)
                    .with("turn", turn),
            );
        }

        if let (Some(store), Some(snapshot)) = (&self.store, snapshot)
            && let Err(e) = store.append(&snapshot)
        {
            warn!(error = %e, "ToolExecutor::end_turn: failed to persist session snapshot");
        }
        stop
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::standard(&Config::default())
    }
}
