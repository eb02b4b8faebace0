//! MetricsHook - in-memory counters over tool activity

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bus::{Hook, HookError};
use super::payload::HookPayload;
use super::{TOOL_AFTER, TOOL_BEFORE, TURN_END};

/// Serializable summary of everything the hook has counted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tool_calls_total: u64,
    pub tool_errors_total: u64,
    pub tool_call_counts: BTreeMap<String, u64>,
    pub tool_error_counts: BTreeMap<String, u64>,
    pub feedback_counts: BTreeMap<String, u64>,
    /// Outstanding patch failures per path; cleared on a successful patch
    pub patch_fail_counts: BTreeMap<String, u64>,
    pub repairs_total: u64,
    pub noops_total: u64,
    pub turns: u64,
}

/// Counts calls, errors, feedback reasons and repairs
#[derive(Default)]
pub struct MetricsHook {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = MetricsSnapshot::default();
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        // counters stay usable even if a panic poisoned the lock
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn on_tool_after(&self, payload: &HookPayload) {
        let tool = payload.str("tool_name").unwrap_or("unknown").to_string();
        let is_error = payload.flag("is_error");
        let mut m = self.lock();

        m.tool_calls_total += 1;
        *m.tool_call_counts.entry(tool.clone()).or_default() += 1;
        if is_error {
            m.tool_errors_total += 1;
            *m.tool_error_counts.entry(tool.clone()).or_default() += 1;
        }
        if payload.get("noop").is_some_and(|v| !v.is_null()) {
            m.noops_total += 1;
        }
        if let Some(reason) = payload.str("feedback_reason") {
            *m.feedback_counts.entry(reason.to_string()).or_default() += 1;
        }
        if tool == "apply_patch"
            && let Some(path) = payload.str("path_value").filter(|p| !p.is_empty())
        {
            if is_error {
                *m.patch_fail_counts.entry(path.to_string()).or_default() += 1;
            } else {
                m.patch_fail_counts.remove(path);
            }
        }
    }
}

impl Hook for MetricsHook {
    fn name(&self) -> &str {
        "metrics"
    }

    fn on_event(&self, event: &str, payload: &HookPayload) -> Result<Option<HookPayload>, HookError> {
        debug!(%event, "MetricsHook::on_event: called");
        match event {
            TOOL_BEFORE => {
                let repairs = payload.get("repairs").and_then(|r| r.as_array()).map_or(0, Vec::len);
                self.lock().repairs_total += repairs as u64;
            }
            TOOL_AFTER => self.on_tool_after(payload),
            TURN_END => self.lock().turns += 1,
            _ => {}
        }
        Ok(None)
    }
}
