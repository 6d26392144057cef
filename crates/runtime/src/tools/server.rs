//! The tool server trait.

use super::{ServerError, ToolDescriptor, ToolOutput};
use serde_json::{Map, Value};
use std::future::Future;

/// A backend capability provider.
///
/// Implementations own their connection exclusively. Lifecycle bookkeeping
/// (ready/failed/closed, cached catalog) lives in
/// [`ToolServerHandle`](super::ToolServerHandle), which wraps this trait.
pub trait ToolServer: Send + Sync {
    /// Establish the session and discover the server's tools.
    fn connect(&mut self) -> impl Future<Output = Result<Vec<ToolDescriptor>, ServerError>> + Send;

    /// Execute one tool call.
    fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> impl Future<Output = Result<ToolOutput, ServerError>> + Send;

    /// Release the connection. Called at most once by the handle.
    fn close(&mut self) -> impl Future<Output = Result<(), ServerError>> + Send;
}
