//! MCP-backed tool server.

use super::{Progress, ServerError, ToolDescriptor, ToolOutput, ToolServer};
use mcp::{CallToolResult, Server, ServerConfig};
use serde_json::{Map, Value};

/// Tool server backed by a stdio MCP process.
///
/// The process is spawned on [`connect`](ToolServer::connect) and killed
/// on [`close`](ToolServer::close).
pub struct McpToolServer {
    config: ServerConfig,
    server: Option<Server>,
}

impl McpToolServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            server: None,
        }
    }
}

impl ToolServer for McpToolServer {
    async fn connect(&mut self) -> Result<Vec<ToolDescriptor>, ServerError> {
        let server = Server::spawn(self.config.clone()).await?;
        server.initialize().await?;

        let tools = server
            .tools()
            .await
            .into_iter()
            .map(ToolDescriptor::from)
            .collect();
        self.server = Some(server);
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolOutput, ServerError> {
        let server = self
            .server
            .as_ref()
            .ok_or_else(|| ServerError::Transport(mcp::Error::NotInitialized.to_string()))?;

        let result = server
            .call_tool(name, Some(Value::Object(arguments.clone())))
            .await?;

        Ok(output_from_result(result))
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        match self.server.take() {
            Some(server) => Ok(server.shutdown().await?),
            None => Ok(()),
        }
    }
}

/// Structured content wins; otherwise the text blocks; otherwise the raw blocks.
fn output_from_result(result: CallToolResult) -> ToolOutput {
    if let Some(structured) = result.structured_content {
        let progress = Progress::from_output(&structured);
        let output = ToolOutput::new(structured);
        return match progress {
            Some(progress) => output.with_progress(progress),
            None => output,
        };
    }

    let text = result.text();
    if !text.is_empty() {
        return ToolOutput::new(Value::String(text));
    }

    ToolOutput::new(serde_json::to_value(&result.content).unwrap_or(Value::Null))
}
