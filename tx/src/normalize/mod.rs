//! Argument normalization pipeline
//!
//! Every incoming call passes through, in order:
//! 1. tool-name resolution against canonical names and aliases
//! 2. JSON repair of the raw argument text
//! 3. parameter alias remapping
//! 4. type coercion toward declared parameter types
//! 5. schema validation
//!
//! Tools only ever see arguments that passed all five steps.

mod coerce;
mod name;
mod repair;
mod validate;

pub use coerce::{coerce_value, parse_number_words};
pub use name::{clean_tool_name, resolve_tool};
pub use repair::{Repair, RepairError, extract_patch_block, parse_arguments};
pub use validate::{coerce_arguments, normalize_key, remap_aliases, validate_arguments};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::tools::{ContractTable, ToolContract, ToolError};

fn new_call_id() -> String {
    Uuid::now_v7().to_string()
}

/// A tool invocation as proposed by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default = "new_call_id")]
    pub id: String,

    pub name: String,

    /// Raw JSON text or an already-parsed object
    #[serde(default, alias = "input", alias = "args")]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: new_call_id(),
            name: name.into(),
            arguments,
        }
    }

    /// Call whose arguments are unparsed model text
    pub fn raw(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::new(name, Value::String(arguments.into()))
    }
}

/// A call after normalization; immutable once dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedCall {
    id: String,
    raw_name: String,
    raw_arguments: Value,
    name: &'static str,
    arguments: Map<String, Value>,
    repairs: Vec<Repair>,
}

impl DispatchedCall {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }

    pub fn raw_arguments(&self) -> &Value {
        &self.raw_arguments
    }

    /// Canonical tool name
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    pub fn repairs(&self) -> &[Repair] {
        &self.repairs
    }
}

/// Run the full normalization pipeline for one call
pub fn normalize_call(call: &ToolCall, table: &ContractTable) -> Result<DispatchedCall, ToolError> {
    debug!(name = %call.name, id = %call.id, "normalize_call: called");
    let contract = resolve_tool(&call.name, table)?;
    let (arguments, repairs) = normalize_arguments(&call.arguments, contract)?;

    Ok(DispatchedCall {
        id: call.id.clone(),
        raw_name: call.name.clone(),
        raw_arguments: call.arguments.clone(),
        name: contract.name,
        arguments,
        repairs,
    })
}

/// Repair, remap, coerce and validate arguments for a known contract
pub fn normalize_arguments(raw: &Value, contract: &ToolContract) -> Result<(Map<String, Value>, Vec<Repair>), ToolError> {
    let (parsed, mut repairs) = parse_arguments(raw, contract.name).map_err(|e| {
        ToolError::validation(
            "invalid_json",
            format!(
                "{}. Accepted parameters: {}. Example: {}",
                e,
                contract.describe_params(),
                contract.usage()
            ),
        )
    })?;

    let (mut arguments, alias_repairs) = remap_aliases(parsed, contract);
    repairs.extend(alias_repairs);
    repairs.extend(coerce_arguments(&mut arguments, contract));
    validate_arguments(&arguments, contract)?;

    if !repairs.is_empty() {
        debug!(tool = contract.name, ?repairs, "normalize_arguments: repaired");
    }
    Ok((arguments, repairs))
}
