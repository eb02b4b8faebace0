//! Hook bus for cross-cutting observers of tool execution
//!
//! The executor emits a small set of named events. Subscribers run in
//! registration order as a pipeline: each sees the payload left by the one
//! before it and may return a replacement.
//!
//! ```text
//!   ToolExecutor ── tool_before ──▶ [ ... ] ── rewritten arguments
//!                ── tool_after  ──▶ [ feedback ▶ metrics ▶ event log ]
//!                ── turn_end    ──▶ [ metrics ▶ event log ]
//!                ── session_stop ─▶ [ event log ]
//! ```
//!
//! A failing or panicking subscriber is logged and skipped; it never aborts
//! the call that emitted the event.

mod bus;
mod feedback;
mod logging;
mod metrics;
mod payload;

pub(crate) use bus::panic_message;
pub use bus::{FnHook, Hook, HookBus, HookError};
pub use feedback::{FeedbackHook, FeedbackRule, FeedbackVars, builtin_rules};
pub use logging::EventLogHook;
pub use metrics::{MetricsHook, MetricsSnapshot};
pub use payload::HookPayload;

/// Emitted before a tool runs; subscribers may rewrite `arguments`
pub const TOOL_BEFORE: &str = "tool_before";

/// Emitted after a call finishes; subscribers may set `feedback_text`
pub const TOOL_AFTER: &str = "tool_after";

pub const TURN_END: &str = "turn_end";

pub const SESSION_STOP: &str = "session_stop";

/// Every event the executor emits
pub const ALL_EVENTS: &[&str] = &[TOOL_BEFORE, TOOL_AFTER, TURN_END, SESSION_STOP];
