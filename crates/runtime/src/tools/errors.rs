use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single tool call failed.
///
/// These are recovered locally: the dispatcher records them in the call's
/// result and the rest of the batch carries on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote failure: {0}")]
    Remote(String),
}

/// Coarse failure classes of the per-call state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No catalog entry, or arguments rejected by the tool's schema.
    UnknownTool,
    Transport,
    Remote,
}

impl ToolError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnknownTool(_) | Self::InvalidArguments { .. } => FailureKind::UnknownTool,
            Self::Transport(_) => FailureKind::Transport,
            Self::Remote(_) => FailureKind::Remote,
        }
    }
}

/// Failure reported by a [`ToolServer`](crate::ToolServer) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// The connection broke down (spawn, I/O, timeout, framing).
    #[error("transport: {0}")]
    Transport(String),
    /// The server answered, and the answer is an error.
    #[error("remote: {0}")]
    Remote(String),
}

impl From<mcp::Error> for ServerError {
    fn from(e: mcp::Error) -> Self {
        if e.is_transport() {
            Self::Transport(e.to_string())
        } else {
            Self::Remote(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violations_share_unknown_tool_class() {
        let err = ToolError::InvalidArguments {
            tool: "search".into(),
            reason: "\"query\" is a required property".into(),
        };
        assert_eq!(err.kind(), FailureKind::UnknownTool);
        assert_eq!(ToolError::UnknownTool("x".into()).kind(), FailureKind::UnknownTool);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(ToolError::Remote("rate limited".into())).unwrap();
        assert_eq!(json["kind"], "remote");
        assert_eq!(json["detail"], "rate limited");
    }

    #[test]
    fn mcp_errors_split_by_origin() {
        assert_eq!(
            ServerError::from(mcp::Error::Timeout),
            ServerError::Transport("timeout waiting for response".into())
        );
        assert!(matches!(
            ServerError::from(mcp::Error::ToolCallFailed("nope".into())),
            ServerError::Remote(_)
        ));
    }
}
