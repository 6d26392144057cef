use thiserror::Error;

use crate::model::ModelError;

/// Errors that escalate past the session.
///
/// Per-call tool failures never appear here; they are folded into
/// [`ToolCallResult`](crate::ToolCallResult) as [`ToolError`](crate::ToolError).
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to initialize tool server {server}: {reason}")]
    Initialization { server: String, reason: String },

    #[error("tool server {0} is not ready")]
    NotReady(String),

    #[error("transport failure on tool server {server}: {reason}")]
    Transport { server: String, reason: String },

    #[error("session already initialized")]
    AlreadyInitialized,

    #[error("session not initialized")]
    NotInitialized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
