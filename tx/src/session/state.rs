//! SessionState - per-run caches and counters threaded through every call

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::tools::NoopLevel;

use super::SessionSnapshot;

/// Hex SHA-256 of file content
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Last content observed for a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVersion {
    pub path: PathBuf,
    pub hash: String,
    pub content: String,
    pub last_seen_turn: u64,
}

/// Mutating operation kinds tracked by no-op counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Write,
    Edit,
    Patch,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Edit => write!(f, "edit"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// Why the host loop should end the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSignal {
    pub reason: String,
    pub consecutive_noop_turns: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct TurnTally {
    mutations: u32,
    noops: u32,
}

/// Mutable state for one session
#[derive(Debug)]
pub struct SessionState {
    id: String,
    turn: u64,
    versions: IndexMap<PathBuf, FileVersion>,
    version_capacity: usize,
    noop_counts: HashMap<(PathBuf, OpKind), u32>,
    written: BTreeSet<PathBuf>,
    seen: HashSet<PathBuf>,
    call_counts: BTreeMap<String, u64>,
    error_counts: BTreeMap<String, u64>,
    edit_counts: HashMap<PathBuf, u32>,
    patch_hashes: HashMap<PathBuf, String>,
    patch_failures: HashMap<PathBuf, u32>,
    tally: TurnTally,
    consecutive_noop_turns: u32,
    stop: Option<StopSignal>,
}

impl SessionState {
    pub fn new(id: impl Into<String>, version_capacity: usize) -> Self {
        let id = id.into();
        debug!(%id, version_capacity, "SessionState::new: called");
        Self {
            id,
            turn: 0,
            versions: IndexMap::new(),
            version_capacity: version_capacity.max(1),
            noop_counts: HashMap::new(),
            written: BTreeSet::new(),
            seen: HashSet::new(),
            call_counts: BTreeMap::new(),
            error_counts: BTreeMap::new(),
            edit_counts: HashMap::new(),
            patch_hashes: HashMap::new(),
            patch_failures: HashMap::new(),
            tally: TurnTally::default(),
            consecutive_noop_turns: 0,
            stop: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    // --- file versions ---

    /// Record content seen by a read; evicts the least recently used entry
    pub fn record_version(&mut self, path: &Path, content: &str) {
        debug!(?path, turn = self.turn, "SessionState::record_version: called");
        self.versions.shift_remove(path);
        self.versions.insert(
            path.to_path_buf(),
            FileVersion {
                path: path.to_path_buf(),
                hash: content_hash(content),
                content: content.to_string(),
                last_seen_turn: self.turn,
            },
        );
        while self.versions.len() > self.version_capacity {
            if let Some((evicted, _)) = self.versions.shift_remove_index(0) {
                debug!(?evicted, "SessionState::record_version: evicted");
            }
        }
        self.seen.insert(path.to_path_buf());
        self.patch_hashes.remove(path);
    }

    pub fn version(&self, path: &Path) -> Option<&FileVersion> {
        self.versions.get(path)
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn invalidate(&mut self, path: &Path) {
        if self.versions.shift_remove(path).is_some() {
            debug!(?path, "SessionState::invalidate: dropped cached version");
        }
    }

    /// Read or written at some point in this session
    pub fn was_seen(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    // --- mutations and no-ops ---

    /// A mutating call changed `path` on disk
    pub fn record_mutation(&mut self, path: &Path) {
        debug!(?path, "SessionState::record_mutation: called");
        self.invalidate(path);
        self.noop_counts.retain(|(p, _), _| p != path);
        self.written.insert(path.to_path_buf());
        self.seen.insert(path.to_path_buf());
        self.tally.mutations += 1;
    }

    /// A mutating call left `path` unchanged; returns the escalation level
    pub fn record_noop(&mut self, path: &Path, op: OpKind) -> NoopLevel {
        let count = self.noop_counts.entry((path.to_path_buf(), op)).or_insert(0);
        *count += 1;
        let count = *count;
        debug!(?path, %op, count, "SessionState::record_noop: called");
        self.tally.mutations += 1;
        self.tally.noops += 1;
        NoopLevel::from_count(count)
    }

    pub fn noop_count(&self, path: &Path, op: OpKind) -> u32 {
        self.noop_counts.get(&(path.to_path_buf(), op)).copied().unwrap_or(0)
    }

    /// A mutating call was attempted but failed
    pub fn record_failed_mutation(&mut self) {
        self.tally.mutations += 1;
    }

    pub fn written_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.written.iter()
    }

    pub fn was_written(&self, path: &Path) -> bool {
        self.written.contains(path)
    }

    /// Count a successful edit; returns the running total for the file
    pub fn record_edit(&mut self, path: &Path) -> u32 {
        let count = self.edit_counts.entry(path.to_path_buf()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn edit_count(&self, path: &Path) -> u32 {
        self.edit_counts.get(path).copied().unwrap_or(0)
    }

    // --- patches ---

    pub fn last_patch_hash(&self, path: &Path) -> Option<&str> {
        self.patch_hashes.get(path).map(String::as_str)
    }

    pub fn set_patch_hash(&mut self, path: &Path, hash: String) {
        self.patch_hashes.insert(path.to_path_buf(), hash);
    }

    pub fn record_patch_failure(&mut self, path: &Path) -> u32 {
        let count = self.patch_failures.entry(path.to_path_buf()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn patch_failures(&self, path: &Path) -> u32 {
        self.patch_failures.get(path).copied().unwrap_or(0)
    }

    pub fn clear_patch_failures(&mut self, path: &Path) {
        self.patch_failures.remove(path);
    }

    // --- calls and turns ---

    pub fn record_call(&mut self, tool: &str, is_error: bool) {
        *self.call_counts.entry(tool.to_string()).or_insert(0) += 1;
        if is_error {
            *self.error_counts.entry(tool.to_string()).or_insert(0) += 1;
        }
    }

    pub fn call_count(&self, tool: &str) -> u64 {
        self.call_counts.get(tool).copied().unwrap_or(0)
    }

    pub fn error_count(&self, tool: &str) -> u64 {
        self.error_counts.get(tool).copied().unwrap_or(0)
    }

    /// Close the current turn and update the no-op-only streak.
    ///
    /// A turn counts toward the streak when it attempted at least one mutation
    /// and every attempted mutation was a no-op. Turns without mutations leave
    /// the streak unchanged.
    pub fn end_turn(&mut self, noop_turn_limit: u32) -> Option<StopSignal> {
        let tally = std::mem::take(&mut self.tally);
        self.turn += 1;

        if tally.mutations > 0 {
            if tally.noops == tally.mutations {
                self.consecutive_noop_turns += 1;
            } else {
                self.consecutive_noop_turns = 0;
            }
        }
        debug!(
            turn = self.turn,
            mutations = tally.mutations,
            noops = tally.noops,
            streak = self.consecutive_noop_turns,
            "SessionState::end_turn: called"
        );

        if noop_turn_limit > 0 && self.consecutive_noop_turns >= noop_turn_limit && self.stop.is_none() {
            let signal = StopSignal {
                reason: format!(
                    "{} consecutive turns made no changes; stopping the run as incomplete",
                    self.consecutive_noop_turns
                ),
                consecutive_noop_turns: self.consecutive_noop_turns,
            };
            info!(session = %self.id, streak = self.consecutive_noop_turns, "SessionState::end_turn: stop signalled");
            self.stop = Some(signal);
        }
        self.stop.clone()
    }

    /// Length of the current no-op-only turn streak
    pub fn consecutive_noop_turns(&self) -> u32 {
        self.consecutive_noop_turns
    }

    pub fn stop_signal(&self) -> Option<&StopSignal> {
        self.stop.as_ref()
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_some()
    }

    // --- persistence ---

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            turn: self.turn,
            timestamp: Utc::now(),
            versions: self
                .versions
                .values()
                .map(|v| super::VersionMeta {
                    path: v.path.clone(),
                    hash: v.hash.clone(),
                    last_seen_turn: v.last_seen_turn,
                })
                .collect(),
            written: self.written.iter().cloned().collect(),
            call_counts: self.call_counts.clone(),
            error_counts: self.error_counts.clone(),
            noop_counts: self
                .noop_counts
                .iter()
                .map(|((path, op), count)| super::NoopEntry {
                    path: path.clone(),
                    op: *op,
                    count: *count,
                })
                .collect(),
            edit_counts: self.edit_counts.iter().map(|(p, c)| (p.clone(), *c)).collect(),
            consecutive_noop_turns: self.consecutive_noop_turns,
        }
    }

    /// Rebuild counters from a snapshot; file contents are not restored
    pub fn restore(snapshot: &SessionSnapshot, version_capacity: usize) -> Self {
        debug!(id = %snapshot.session_id, turn = snapshot.turn, "SessionState::restore: called");
        let mut state = Self::new(snapshot.session_id.clone(), version_capacity);
        state.turn = snapshot.turn;
        state.written = snapshot.written.iter().cloned().collect();
        state.seen = snapshot.written.iter().cloned().collect();
        state.call_counts = snapshot.call_counts.clone();
        state.error_counts = snapshot.error_counts.clone();
        state.noop_counts = snapshot
            .noop_counts
            .iter()
            .map(|e| ((e.path.clone(), e.op), e.count))
            .collect();
        state.edit_counts = snapshot.edit_counts.iter().map(|(p, c)| (p.clone(), *c)).collect();
        state.consecutive_noop_turns = snapshot.consecutive_noop_turns;
        state
    }
}
