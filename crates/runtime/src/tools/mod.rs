//! Tool servers: the trait, its lifecycle handle and the MCP implementation.

pub mod errors;
mod handle;
mod mcp_host;
mod server;
mod types;

pub use errors::{FailureKind, ServerError, ToolError};
pub use handle::{ServerState, ToolServerHandle};
pub use mcp_host::McpToolServer;
pub use server::ToolServer;
pub use types::{
    CallKey, Outcome, Parameter, Progress, ToolCallRequest, ToolCallResult, ToolDescriptor,
    ToolOutput,
};
