//! mcp-llm runtime: tool orchestration between a language model and MCP
//! tool servers.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **ToolServer**: a backend capability provider (usually an MCP process),
//!   wrapped in a [`ToolServerHandle`] that tracks its lifecycle.
//! - **ToolCatalog**: every ready server's tools in one namespace, first
//!   registration winning on name clashes.
//! - **Parser**: turns the model's free text into tool calls, or decides
//!   there are none.
//! - **Dispatcher**: runs the calls concurrently and folds every failure
//!   into that call's result.
//! - **Session**: owns the history and drives each turn, asking the model a
//!   second time when tools ran.
//!
//! # Example
//!
//! ```ignore
//! use mcp::ServerConfig;
//! use runtime::{McpToolServer, OpenAiModel, Session, ToolServerHandle};
//!
//! # async fn example() -> runtime::Result<()> {
//! let model = OpenAiModel::builder("sk-...", "gpt-4o-mini").build();
//! let config = ServerConfig::new("search", "mcp-server-search");
//! let servers = vec![ToolServerHandle::new("search", McpToolServer::new(config))];
//!
//! let mut session = Session::new(model, servers);
//! session.initialize().await?;
//! let outcome = session.run_turn("How are 3D Gaussian splats rendered?").await?;
//! println!("{}", outcome.text());
//! session.cleanup().await;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod dispatch;
mod error;
pub mod mock;
pub mod model;
pub mod parser;
mod prompt;
mod session;
pub mod tools;

pub use catalog::{CatalogEntry, ToolCatalog};
pub use dispatch::{CallPhase, Dispatch, Dispatcher, ToolResults};
pub use error::{Error, Result};
pub use model::{Message, Model, ModelError, OpenAiModel, Role};
pub use parser::ParsedResponse;
pub use prompt::{system_prompt, tool_results_message};
pub use session::{InitPolicy, Session, SessionId, TurnOutcome};
pub use tools::{
    CallKey, FailureKind, McpToolServer, Outcome, Progress, ServerError, ServerState,
    ToolCallRequest, ToolCallResult, ToolDescriptor, ToolError, ToolOutput, ToolServer,
    ToolServerHandle,
};
