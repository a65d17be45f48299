use serde::Deserialize;
use serde::Serialize;

/// A model-issued request to perform a side effect. `arguments` is the raw
/// JSON the model produced, kept as a string (not parsed) because the gate
/// never validates the tool's argument schema — it only extracts individual
/// fields (`command`, `path`, ...) by name when it needs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse `arguments` as JSON and extract a top-level string field.
    /// Returns `None` if the arguments aren't an object or the field is
    /// missing/not a string — this is a soft lookup, never an error.
    pub fn string_arg(&self, field: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(&self.arguments).ok()?;
        value.get(field)?.as_str().map(str::to_owned)
    }
}
