//! SessionStore - ordered snapshot lists persisted as JSONL per session id

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::SessionSnapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("session id is empty")]
    EmptyId,
}

/// Escape a session id so it names exactly one file in the store directory
pub fn escape_session_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for ch in id.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            ':' => out.push_str("%3A"),
            _ => out.push(ch),
        }
    }
    if out.starts_with('.') {
        // keep "." and ".." from naming directories
        out.replace_range(0..1, "%2E");
    }
    out
}

pub fn unescape_session_id(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let decoded = match rest.get(pos + 1..pos + 3) {
            Some("25") => Some('%'),
            Some("2F") => Some('/'),
            Some("5C") => Some('\\'),
            Some("3A") => Some(':'),
            Some("2E") => Some('.'),
            _ => None,
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[pos + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Append-only snapshot store
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open a store, creating the directory when needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        debug!(?dir, "SessionStore::open: called");
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        if session_id.is_empty() {
            return Err(StoreError::EmptyId);
        }
        Ok(self.dir.join(format!("{}.jsonl", escape_session_id(session_id))))
    }

    /// Append one snapshot under an exclusive file lock
    pub fn append(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let path = self.path_for(&snapshot.session_id)?;
        debug!(?path, turn = snapshot.turn, "SessionStore::append: called");
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let line = serde_json::to_string(snapshot)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path).map_err(io_err)?;
        file.lock_exclusive().map_err(io_err)?;
        let written = writeln!(file, "{}", line).and_then(|_| file.flush());
        let unlocked = FileExt::unlock(&file);
        written.map_err(io_err)?;
        unlocked.map_err(io_err)?;
        Ok(())
    }

    /// All snapshots for a session in append order; malformed lines are skipped
    pub fn load(&self, session_id: &str) -> Result<Vec<SessionSnapshot>, StoreError> {
        let path = self.path_for(session_id)?;
        debug!(?path, "SessionStore::load: called");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(io_err)?;
        FileExt::lock_shared(&file).map_err(io_err)?;
        let mut snapshots = Vec::new();
        for (idx, line) in BufReader::new(&file).lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(?path, line = idx + 1, %e, "SessionStore::load: unreadable line");
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionSnapshot>(&line) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!(?path, line = idx + 1, %e, "SessionStore::load: skipping malformed snapshot"),
            }
        }
        FileExt::unlock(&file).map_err(io_err)?;
        Ok(snapshots)
    }

    pub fn latest(&self, session_id: &str) -> Result<Option<SessionSnapshot>, StoreError> {
        Ok(self.load(session_id)?.pop())
    }

    /// Session ids with at least one snapshot file
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".jsonl").map(unescape_session_id)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use tempfile::tempdir;

    #[test]
    fn test_escape_path_separators() {
        assert_eq!(escape_session_id("run/2024/a"), "run%2F2024%2Fa");
        assert_eq!(escape_session_id(r"c:\x"), "c%3A%5Cx");
        assert_eq!(escape_session_id("100%"), "100%25");
        assert_eq!(escape_session_id(".."), "%2E.");
        assert!(!escape_session_id("a/b\\c").contains('/'));
    }

    #[test]
    fn test_unescape_inverts_escape() {
        for id in ["run/1", "a%2Fb", r"x\y:z", "..", "plain"] {
            assert_eq!(unescape_session_id(&escape_session_id(id)), id);
        }
    }

    #[test]
    fn test_append_and_load_in_order() {
        let temp = tempdir().unwrap();
        let store = SessionStore::open(temp.path().join("sessions")).unwrap();
        let mut state = SessionState::new("agent/run-1", 10);

        store.append(&state.snapshot()).unwrap();
        state.record_call("read", false);
        state.end_turn(3);
        store.append(&state.snapshot()).unwrap();

        let loaded = store.load("agent/run-1").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].turn, 0);
        assert_eq!(loaded[1].turn, 1);
        assert_eq!(loaded[1].call_counts.get("read"), Some(&1));

        // one flat file, no nested directory
        assert!(store.dir().join("agent%2Frun-1.jsonl").is_file());
        assert!(!store.dir().join("agent").exists());
        assert_eq!(store.list().unwrap(), vec!["agent/run-1".to_string()]);
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let temp = tempdir().unwrap();
        let store = SessionStore::open(temp.path()).unwrap();
        let state = SessionState::new("s", 10);
        store.append(&state.snapshot()).unwrap();
        let path = store.path_for("s").unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        assert_eq!(store.load("s").unwrap().len(), 1);
        assert_eq!(store.latest("s").unwrap().unwrap().session_id, "s");
    }

    #[test]
    fn test_load_missing_session_is_empty() {
        let temp = tempdir().unwrap();
        let store = SessionStore::open(temp.path()).unwrap();
        assert!(store.load("nope").unwrap().is_empty());
        assert!(matches!(store.path_for(""), Err(StoreError::EmptyId)));
    }
}
