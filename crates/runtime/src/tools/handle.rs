//! Lifecycle wrapper around a tool server.

use super::{ServerError, ToolCallRequest, ToolCallResult, ToolDescriptor, ToolError, ToolServer};
use crate::{Error, Result};
use tracing::{debug, info, warn};

/// Connection state of a tool server.
///
/// `Uninitialized → Ready` on a successful initialize, `→ Failed` on an
/// initialize error (terminal for the session), `→ Closed` on cleanup
/// (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Uninitialized,
    Ready,
    Failed,
    Closed,
}

/// A registered tool server with its state and cached catalog.
pub struct ToolServerHandle<S> {
    id: String,
    server: S,
    state: ServerState,
    catalog: Vec<ToolDescriptor>,
}

impl<S: ToolServer> ToolServerHandle<S> {
    pub fn new(id: impl Into<String>, server: S) -> Self {
        Self {
            id: id.into(),
            server,
            state: ServerState::Uninitialized,
            catalog: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ServerState::Ready
    }

    /// Access the wrapped server.
    pub fn server(&self) -> &S {
        &self.server
    }

    /// Connect and cache the tool catalog.
    ///
    /// Never retried: a failure leaves the handle `Failed` for good.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.state {
            ServerState::Ready => return Ok(()),
            ServerState::Failed => {
                return Err(self.init_error("initialization previously failed"));
            }
            ServerState::Closed => return Err(self.init_error("server is closed")),
            ServerState::Uninitialized => {}
        }

        match self.server.connect().await {
            Ok(tools) => {
                info!(server = %self.id, tools = tools.len(), "tool server ready");
                self.catalog = tools;
                self.state = ServerState::Ready;
                Ok(())
            }
            Err(e) => {
                warn!(server = %self.id, error = %e, "tool server failed to initialize");
                self.state = ServerState::Failed;
                Err(self.init_error(e.to_string()))
            }
        }
    }

    /// The cached catalog. Fails unless the server is `Ready`.
    pub fn list_tools(&self) -> Result<&[ToolDescriptor]> {
        if !self.is_ready() {
            return Err(Error::NotReady(self.id.clone()));
        }
        Ok(&self.catalog)
    }

    /// Execute a call on this server.
    ///
    /// Remote failures come back as a `Failure` result. Transport faults
    /// propagate as [`Error::Transport`] so the caller picks the policy.
    pub async fn execute_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult> {
        if !self.is_ready() {
            return Err(Error::NotReady(self.id.clone()));
        }

        debug!(server = %self.id, tool = %request.tool_name, "executing tool");
        match self
            .server
            .call_tool(&request.tool_name, &request.arguments)
            .await
        {
            Ok(output) => Ok(ToolCallResult::success(request.clone(), &self.id, output)),
            Err(ServerError::Remote(reason)) => Ok(ToolCallResult::failure(
                request.clone(),
                Some(self.id.clone()),
                ToolError::Remote(reason),
            )),
            Err(ServerError::Transport(reason)) => Err(Error::Transport {
                server: self.id.clone(),
                reason,
            }),
        }
    }

    /// Release the server. Idempotent: once `Closed`, does nothing.
    pub async fn cleanup(&mut self) -> Result<()> {
        if self.state == ServerState::Closed {
            return Ok(());
        }

        let was_connected = self.state == ServerState::Ready;
        self.state = ServerState::Closed;
        self.catalog.clear();

        if !was_connected {
            return Ok(());
        }

        self.server.close().await.map_err(|e| Error::Transport {
            server: self.id.clone(),
            reason: e.to_string(),
        })?;
        debug!(server = %self.id, "tool server closed");
        Ok(())
    }

    fn init_error(&self, reason: impl Into<String>) -> Error {
        Error::Initialization {
            server: self.id.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::StaticToolServer;
    use serde_json::json;

    fn weather() -> StaticToolServer {
        StaticToolServer::new()
            .with_tool(
                ToolDescriptor::new("forecast", "Weather forecast", json!({"type": "object"})),
                json!("sunny"),
            )
            .with_remote_failure(
                ToolDescriptor::new("alerts", "Weather alerts", json!({"type": "object"})),
                "service unavailable",
            )
            .with_transport_failure(
                ToolDescriptor::new("radar", "Radar image", json!({"type": "object"})),
                "broken pipe",
            )
    }

    #[test]
    fn list_tools_before_ready_fails() {
        let handle = ToolServerHandle::new("weather", weather());
        assert!(matches!(handle.list_tools(), Err(Error::NotReady(id)) if id == "weather"));
    }

    #[tokio::test]
    async fn initialize_caches_catalog() {
        let mut handle = ToolServerHandle::new("weather", weather());
        handle.initialize().await.unwrap();
        assert_eq!(handle.state(), ServerState::Ready);
        let names: Vec<_> = handle.list_tools().unwrap().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["forecast", "alerts", "radar"]);
    }

    #[tokio::test]
    async fn failed_initialize_is_terminal() {
        let mut handle = ToolServerHandle::new("broken", StaticToolServer::failing("handshake refused"));
        let err = handle.initialize().await.unwrap_err();
        assert!(matches!(err, Error::Initialization { ref server, .. } if server == "broken"));
        assert_eq!(handle.state(), ServerState::Failed);

        assert!(handle.initialize().await.is_err());
        assert_eq!(handle.server().connect_attempts(), 1);
    }

    #[tokio::test]
    async fn remote_failure_becomes_result_transport_propagates() {
        let mut handle = ToolServerHandle::new("weather", weather());
        handle.initialize().await.unwrap();

        let ok = handle
            .execute_tool(&ToolCallRequest::new("forecast", json!({})))
            .await
            .unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.server_id.as_deref(), Some("weather"));

        let remote = handle
            .execute_tool(&ToolCallRequest::new("alerts", json!({})))
            .await
            .unwrap();
        assert_eq!(
            remote.error(),
            Some(&ToolError::Remote("service unavailable".into()))
        );

        let transport = handle
            .execute_tool(&ToolCallRequest::new("radar", json!({})))
            .await;
        assert!(matches!(transport, Err(Error::Transport { .. })));
    }

    #[tokio::test]
    async fn cleanup_twice_closes_once() {
        let mut handle = ToolServerHandle::new("weather", weather());
        handle.initialize().await.unwrap();

        handle.cleanup().await.unwrap();
        handle.cleanup().await.unwrap();

        assert_eq!(handle.state(), ServerState::Closed);
        assert_eq!(handle.server().close_count(), 1);
        assert!(handle.list_tools().is_err());
    }

    #[tokio::test]
    async fn cleanup_of_unused_server_skips_close() {
        let mut handle = ToolServerHandle::new("weather", weather());
        handle.cleanup().await.unwrap();
        assert_eq!(handle.state(), ServerState::Closed);
        assert_eq!(handle.server().close_count(), 0);
        assert!(handle.initialize().await.is_err());
    }
}
