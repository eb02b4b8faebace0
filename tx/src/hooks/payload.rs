//! HookPayload - the JSON object passed along a hook pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event payload; a JSON object with typed accessors for the common fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookPayload(Map<String, Value>);

impl HookPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`HookPayload::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// String field; `None` when absent, null or not a string
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    /// Boolean field; absent counts as false
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for HookPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_accessors() {
        let payload = HookPayload::new()
            .with("tool_name", "edit")
            .with("is_error", true)
            .with("patch_fail_count", 2u32)
            .with("path_value", Option::<String>::None);

        assert_eq!(payload.str("tool_name"), Some("edit"));
        assert!(payload.flag("is_error"));
        assert!(!payload.flag("noop"));
        assert_eq!(payload.u64("patch_fail_count"), Some(2));
        assert_eq!(payload.str("path_value"), None);
        assert_eq!(payload.get("path_value"), Some(&Value::Null));
    }

    #[test]
    fn test_payload_serializes_as_plain_object() {
        let payload = HookPayload::new().with("turn", 3u64);
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({"turn": 3}));
    }
}
