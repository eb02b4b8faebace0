//! Tool contracts - canonical names, aliases and parameter lists

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    /// Array of strings
    StringArray,
}

impl ParamType {
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::StringArray => "array",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::StringArray => value.as_array().is_some_and(|a| a.iter().all(Value::is_string)),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringArray => f.write_str("array of strings"),
            other => f.write_str(other.json_type()),
        }
    }
}

/// One parameter of a tool
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            aliases: &[],
            description,
        }
    }

    pub fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            aliases: &[],
            description,
        }
    }

    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }
}

/// Whether a tool mutates the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ReadOnly,
    Mutating,
}

/// Complete contract of one tool
#[derive(Debug, Clone)]
pub struct ToolContract {
    pub name: &'static str,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
    pub params: Vec<ParamSpec>,
    pub kind: ToolKind,
    /// Minimal JSON arguments shown when validation fails
    pub example: &'static str,
}

impl ToolContract {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn is_mutating(&self) -> bool {
        self.kind == ToolKind::Mutating
    }

    /// JSON Schema for input parameters
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for param in &self.params {
            let mut schema = json!({
                "type": param.ty.json_type(),
                "description": param.description,
            });
            if param.ty == ParamType::StringArray {
                schema["items"] = json!({ "type": "string" });
            }
            properties.insert(param.name.to_string(), schema);
        }
        let required: Vec<&str> = self.params.iter().filter(|p| p.required).map(|p| p.name).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Human-readable parameter list, e.g. `path (string, required), offset (integer)`
    pub fn describe_params(&self) -> String {
        self.params
            .iter()
            .map(|p| {
                if p.required {
                    format!("{} ({}, required)", p.name, p.ty)
                } else {
                    format!("{} ({})", p.name, p.ty)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn usage(&self) -> String {
        format!("{}({})", self.name, self.example)
    }
}

/// Tool definition exported to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<&ToolContract> for ToolDefinition {
    fn from(contract: &ToolContract) -> Self {
        Self {
            name: contract.name.to_string(),
            description: contract.description.to_string(),
            input_schema: contract.input_schema(),
        }
    }
}

/// Registered contracts plus the alias lookup table
#[derive(Debug, Clone, Default)]
pub struct ContractTable {
    contracts: IndexMap<&'static str, ToolContract>,
    aliases: HashMap<String, &'static str>,
}

impl ContractTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, contract: ToolContract) {
        debug!(name = contract.name, "ContractTable::insert: called");
        for alias in contract.aliases {
            self.aliases.insert(alias.to_lowercase(), contract.name);
        }
        self.aliases.insert(contract.name.to_lowercase(), contract.name);
        self.contracts.insert(contract.name, contract);
    }

    pub fn get(&self, name: &str) -> Option<&ToolContract> {
        self.contracts.get(name)
    }

    /// Look up a cleaned, lowercased name among canonical names and aliases
    pub fn lookup(&self, cleaned: &str) -> Option<&ToolContract> {
        self.aliases.get(cleaned).and_then(|name| self.contracts.get(name))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.contracts.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolContract> {
        self.contracts.values()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ToolContract {
        ToolContract {
            name: "read",
            description: "Read a file",
            aliases: &["read_file", "View"],
            params: vec![
                ParamSpec::required("path", ParamType::String, "File path").aliases(&["file_path"]),
                ParamSpec::optional("limit", ParamType::Integer, "Max lines"),
            ],
            kind: ToolKind::ReadOnly,
            example: r#"{"path": "src/main.rs"}"#,
        }
    }

    #[test]
    fn test_input_schema_forbids_additional_properties() {
        let schema = sample().input_schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"], json!(["path"]));
        assert_eq!(schema["properties"]["limit"]["type"], json!("integer"));
    }

    #[test]
    fn test_table_lookup_by_alias() {
        let mut table = ContractTable::new();
        table.insert(sample());
        assert_eq!(table.lookup("read_file").map(|c| c.name), Some("read"));
        assert_eq!(table.lookup("view").map(|c| c.name), Some("read"));
        assert_eq!(table.lookup("read").map(|c| c.name), Some("read"));
        assert!(table.lookup("write").is_none());
    }

    #[test]
    fn test_describe_params() {
        let text = sample().describe_params();
        assert_eq!(text, "path (string, required), limit (integer)");
    }

    #[test]
    fn test_param_type_accepts() {
        assert!(ParamType::Integer.accepts(&json!(3)));
        assert!(!ParamType::Integer.accepts(&json!("3")));
        assert!(ParamType::StringArray.accepts(&json!(["a", "b"])));
        assert!(!ParamType::StringArray.accepts(&json!(["a", 1])));
    }
}
