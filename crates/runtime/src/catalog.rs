//! The aggregated tool namespace seen by the model.
//!
//! Built once per session from every `Ready` server, in registration order.
//! Names are unique: when two servers declare the same tool, the server
//! registered first keeps it and the later declaration is dropped with a
//! warning.

use std::collections::HashMap;
use std::fmt;

use jsonschema::JSONSchema;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::tools::{ToolDescriptor, ToolServer, ToolServerHandle};

/// A tool together with the server that owns it.
pub struct CatalogEntry {
    pub descriptor: ToolDescriptor,
    pub server_id: String,
    /// Position of the owning server in the session's server list.
    pub server_index: usize,
    validator: Option<JSONSchema>,
}

impl CatalogEntry {
    fn new(descriptor: ToolDescriptor, server_id: &str, server_index: usize) -> Self {
        let validator = match JSONSchema::compile(&descriptor.input_schema) {
            Ok(schema) => Some(schema),
            Err(e) => {
                warn!(
                    tool = %descriptor.name,
                    server = %server_id,
                    error = %e,
                    "tool schema does not compile, arguments will not be validated"
                );
                None
            }
        };
        Self {
            descriptor,
            server_id: server_id.to_string(),
            server_index,
            validator,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Check arguments against the tool's declared schema.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), String> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let instance = Value::Object(arguments.clone());
        validator.validate(&instance).map_err(|errors| {
            errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        })
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.descriptor.name)
            .field("server_id", &self.server_id)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// Deduplicated, ordered tool catalog.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Collect the tools of every ready server, first registration wins.
    pub fn build<S: ToolServer>(servers: &[ToolServerHandle<S>]) -> Self {
        let mut catalog = Self::default();
        for (index, handle) in servers.iter().enumerate() {
            let Ok(tools) = handle.list_tools() else {
                debug!(server = %handle.id(), state = ?handle.state(), "skipping server that is not ready");
                continue;
            };
            for tool in tools {
                catalog.insert(tool.clone(), handle.id(), index);
            }
        }
        catalog
    }

    fn insert(&mut self, descriptor: ToolDescriptor, server_id: &str, server_index: usize) {
        if let Some(&existing) = self.by_name.get(&descriptor.name) {
            warn!(
                tool = %descriptor.name,
                kept = %self.entries[existing].server_id,
                dropped = %server_id,
                "duplicate tool name, keeping first registration"
            );
            return;
        }
        self.by_name
            .insert(descriptor.name.clone(), self.entries.len());
        self.entries
            .push(CatalogEntry::new(descriptor, server_id, server_index));
    }

    /// Find the entry owning `name`.
    pub fn resolve(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(CatalogEntry::name)
    }

    /// Prompt text for the catalog, in registration order.
    ///
    /// Deterministic for a given catalog, so prompts are reproducible.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| render_tool(&entry.descriptor))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn render_tool(tool: &ToolDescriptor) -> String {
    let mut out = format!("Tool: {}\nDescription: {}\n", tool.name, tool.description);
    let params = tool.parameters();
    if params.is_empty() {
        out.push_str("Arguments: none\n");
        return out;
    }
    out.push_str("Arguments:\n");
    for param in params {
        out.push_str("- ");
        out.push_str(&param.name);
        if let Some(description) = &param.description {
            out.push_str(": ");
            out.push_str(description);
        }
        let mut notes = Vec::new();
        if let Some(kind) = &param.kind {
            notes.push(kind.as_str());
        }
        if param.required {
            notes.push("required");
        }
        if !notes.is_empty() {
            out.push_str(&format!(" ({})", notes.join(", ")));
        }
        out.push('\n');
    }
    out
}
