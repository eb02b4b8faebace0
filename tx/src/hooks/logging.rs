//! EventLogHook - persists every hook event to a JSONL file

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use super::bus::{Hook, HookError};
use super::payload::HookPayload;

/// Appends `{ "ts", "event", ...payload }` lines to a log file
pub struct EventLogHook {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl EventLogHook {
    /// Open (or create) the log file, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HookError> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "EventLogHook::open: called");
        let io_err = |source| HookError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path).map_err(io_err)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one event line and flush
    pub fn write_event(&self, event: &str, payload: &HookPayload) -> Result<(), HookError> {
        let mut record = Map::new();
        record.insert("ts".to_string(), Value::String(Utc::now().to_rfc3339()));
        record.insert("event".to_string(), Value::String(event.to_string()));
        for (key, value) in payload.as_map() {
            if key != "ts" && key != "event" {
                record.insert(key.clone(), value.clone());
            }
        }
        let line = serde_json::to_string(&record)?;

        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let io_err = |source| HookError::Io {
            path: self.path.clone(),
            source,
        };
        writeln!(writer, "{}", line).map_err(io_err)?;
        writer.flush().map_err(io_err)?;
        Ok(())
    }
}

impl Hook for EventLogHook {
    fn name(&self) -> &str {
        "event_log"
    }

    fn on_event(&self, event: &str, payload: &HookPayload) -> Result<Option<HookPayload>, HookError> {
        debug!(%event, "EventLogHook::on_event: called");
        self.write_event(event, payload)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{TOOL_AFTER, TURN_END};
    use tempfile::tempdir;

    #[test]
    fn test_writes_one_line_per_event() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("logs/events.jsonl");
        let hook = EventLogHook::open(&path).unwrap();

        hook.on_event(TOOL_AFTER, &HookPayload::new().with("tool_name", "read")).unwrap();
        hook.on_event(TURN_END, &HookPayload::new().with("turn", 1u64)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "tool_after");
        assert_eq!(lines[0]["tool_name"], "read");
        assert_eq!(lines[1]["turn"], 1);
        let ts = lines[0]["ts"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_appends_to_existing_log() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("events.jsonl");
        fs::write(&path, "{\"event\":\"old\"}\n").unwrap();

        let hook = EventLogHook::open(&path).unwrap();
        hook.write_event("session_stop", &HookPayload::new()).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
