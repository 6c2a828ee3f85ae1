//! The contract every loadable tool implements

use crate::error::ToolError;
use async_trait::async_trait;
use serde_json::Value;

/// Named parameters passed to a tool
pub type Parameters = serde_json::Map<String, Value>;

/// A self-contained unit of logic that can be executed on demand
///
/// Implementations must be reentrant: a bound instance is shared by all
/// concurrent requests for its id and calls into it are not serialized.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable key, normally equal to the descriptor id
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run the tool and return a mapping of output field names to values
    ///
    /// Missing or malformed parameters are reported as `ToolError`, never by
    /// panicking.
    async fn execute(&self, parameters: &Parameters) -> Result<Value, ToolError>;
}

/// Get a required string parameter
pub fn required_str<'a>(parameters: &'a Parameters, name: &str) -> Result<&'a str, ToolError> {
    optional_str(parameters, name)?.ok_or_else(|| ToolError::MissingParameter(name.to_string()))
}

/// Get an optional string parameter; `null` counts as absent
pub fn optional_str<'a>(
    parameters: &'a Parameters,
    name: &str,
) -> Result<Option<&'a str>, ToolError> {
    match parameters.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ToolError::InvalidParameterType {
            name: name.to_string(),
            expected: "a string",
            found: value_type_name(other),
        }),
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
