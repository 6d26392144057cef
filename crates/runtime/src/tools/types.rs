//! Tool-related types.

use super::ToolError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// A tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

/// One argument of a tool, as declared by its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub required: bool,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Declared parameters, in schema order.
    pub fn parameters(&self) -> Vec<Parameter> {
        let required: Vec<&str> = self
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let Some(properties) = self.input_schema.get("properties").and_then(Value::as_object)
        else {
            return Vec::new();
        };

        properties
            .iter()
            .map(|(name, spec)| Parameter {
                name: name.clone(),
                kind: spec.get("type").and_then(Value::as_str).map(str::to_string),
                description: spec
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                required: required.contains(&name.as_str()),
            })
            .collect()
    }
}

impl From<mcp::Tool> for ToolDescriptor {
    fn from(tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    #[serde(rename = "tool")]
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Identifies one call within a batch: `(sequence index, tool name)`.
///
/// Two calls to the same tool get different keys, so their results never
/// overwrite each other. Ordering follows the sequence index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallKey {
    pub index: usize,
    pub tool_name: String,
}

impl CallKey {
    pub fn new(index: usize, tool_name: impl Into<String>) -> Self {
        Self {
            index,
            tool_name: tool_name.into(),
        }
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.tool_name, self.index)
    }
}

impl Serialize for CallKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Progress reported alongside a tool's output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: f64,
    pub total: f64,
}

impl Progress {
    /// Completion percentage, `None` when the total is zero.
    pub fn percentage(&self) -> Option<f64> {
        (self.total > 0.0).then(|| self.completed / self.total * 100.0)
    }

    /// Read `progress`/`total` numeric fields from a tool's output.
    pub fn from_output(output: &Value) -> Option<Self> {
        let completed = output.get("progress")?.as_f64()?;
        let total = output.get("total")?.as_f64()?;
        Some(Self { completed, total })
    }
}

/// What a tool server returned for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub value: Value,
    pub progress: Option<Progress>,
}

impl ToolOutput {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Outcome of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { output: Value },
    Failure { error: ToolError },
}

/// The result of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallResult {
    pub request: ToolCallRequest,
    /// Owning server; absent when the tool could not be resolved.
    pub server_id: Option<String>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

impl ToolCallResult {
    pub fn success(request: ToolCallRequest, server_id: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            request,
            server_id: Some(server_id.into()),
            outcome: Outcome::Success {
                output: output.value,
            },
            progress: output.progress,
        }
    }

    pub fn failure(request: ToolCallRequest, server_id: Option<String>, error: ToolError) -> Self {
        Self {
            request,
            server_id,
            outcome: Outcome::Failure { error },
            progress: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn error(&self) -> Option<&ToolError> {
        match &self.outcome {
            Outcome::Failure { error } => Some(error),
            Outcome::Success { .. } => None,
        }
    }
}
