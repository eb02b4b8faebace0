//! Session state and snapshot persistence
//!
//! `SessionState` is created at run start and passed explicitly through every
//! tool call via the `ToolContext`. `SessionStore` persists an ordered list of
//! snapshots per session id for hosts that want to resume or audit a run.

mod state;
mod store;

pub use state::{FileVersion, OpKind, SessionState, StopSignal, content_hash};
pub use store::{SessionStore, StoreError, escape_session_id, unescape_session_id};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Cached version metadata; contents are not persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub path: PathBuf,
    pub hash: String,
    pub last_seen_turn: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoopEntry {
    pub path: PathBuf,
    pub op: OpKind,
    pub count: u32,
}

/// Serializable view of a session at the end of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub turn: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub versions: Vec<VersionMeta>,
    #[serde(default)]
    pub written: Vec<PathBuf>,
    #[serde(default)]
    pub call_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub error_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub noop_counts: Vec<NoopEntry>,
    #[serde(default)]
    pub edit_counts: BTreeMap<PathBuf, u32>,
    #[serde(default)]
    pub consecutive_noop_turns: u32,
}
