//! Route parsed tool calls to their servers and gather the results.
//!
//! Each call moves through `Pending → Resolved → Succeeded | Failed`. A
//! failure is recorded in that call's result and never aborts the batch.
//! Calls run concurrently; the batch completes when every call has.
//! There are no retries.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::ToolCatalog;
use crate::tools::{
    CallKey, FailureKind, ToolCallRequest, ToolCallResult, ToolError, ToolServer, ToolServerHandle,
};

/// Where a call stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Pending,
    Resolved,
    Succeeded,
    Failed(FailureKind),
}

impl CallPhase {
    /// Terminal phase of a finished call.
    pub fn of(result: &ToolCallResult) -> Self {
        match result.error() {
            None => Self::Succeeded,
            Some(error) => Self::Failed(error.kind()),
        }
    }
}

/// Results of one batch keyed by `(index, tool)`, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ToolResults(BTreeMap<CallKey, ToolCallResult>);

impl ToolResults {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &CallKey) -> Option<&ToolCallResult> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CallKey, &ToolCallResult)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CallKey> {
        self.0.keys()
    }

    /// Failed calls with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&CallKey, &ToolError)> {
        self.0
            .iter()
            .filter_map(|(key, result)| result.error().map(|e| (key, e)))
    }
}

impl FromIterator<(CallKey, ToolCallResult)> for ToolResults {
    fn from_iter<I: IntoIterator<Item = (CallKey, ToolCallResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of dispatching a parsed response.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Nothing to run; the model's text stands as the answer.
    NoCalls,
    Results(ToolResults),
}

/// Executes tool calls against the servers that own them.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    call_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail calls that take longer than `timeout` as transport failures.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub async fn dispatch<S: ToolServer>(
        &self,
        requests: Vec<ToolCallRequest>,
        catalog: &ToolCatalog,
        servers: &[ToolServerHandle<S>],
    ) -> Dispatch {
        if requests.is_empty() {
            return Dispatch::NoCalls;
        }

        let calls = requests.into_iter().enumerate().map(|(index, request)| {
            let key = CallKey::new(index, request.tool_name.clone());
            async move {
                let result = self.run_call(&key, request, catalog, servers).await;
                (key, result)
            }
        });

        let results: ToolResults = join_all(calls).await.into_iter().collect();
        Dispatch::Results(results)
    }

    async fn run_call<S: ToolServer>(
        &self,
        key: &CallKey,
        request: ToolCallRequest,
        catalog: &ToolCatalog,
        servers: &[ToolServerHandle<S>],
    ) -> ToolCallResult {
        debug!(key = %key, phase = ?CallPhase::Pending, "tool call");

        let Some(entry) = catalog.resolve(&request.tool_name) else {
            let error = ToolError::UnknownTool(request.tool_name.clone());
            return finish(key, ToolCallResult::failure(request, None, error));
        };

        if let Err(reason) = entry.validate(&request.arguments) {
            let error = ToolError::InvalidArguments {
                tool: request.tool_name.clone(),
                reason,
            };
            let server = Some(entry.server_id.clone());
            return finish(key, ToolCallResult::failure(request, server, error));
        }

        let Some(handle) = servers.get(entry.server_index) else {
            let error = ToolError::UnknownTool(request.tool_name.clone());
            return finish(key, ToolCallResult::failure(request, None, error));
        };
        debug!(key = %key, phase = ?CallPhase::Resolved, server = %handle.id(), "tool call");

        let call = handle.execute_tool(&request);
        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let error = ToolError::Transport(format!("timed out after {limit:?}"));
                    let server = Some(handle.id().to_string());
                    return finish(key, ToolCallResult::failure(request, server, error));
                }
            },
            None => call.await,
        };

        let result = outcome.unwrap_or_else(|e| {
            ToolCallResult::failure(
                request,
                Some(handle.id().to_string()),
                ToolError::Transport(e.to_string()),
            )
        });
        finish(key, result)
    }
}

fn finish(key: &CallKey, result: ToolCallResult) -> ToolCallResult {
    let phase = CallPhase::of(&result);
    match result.error() {
        None => debug!(key = %key, phase = ?phase, "tool call"),
        Some(error) => warn!(key = %key, phase = ?phase, error = %error, "tool call failed"),
    }
    if let Some(progress) = result.progress {
        info!(
            key = %key,
            completed = progress.completed,
            total = progress.total,
            percent = progress.percentage().unwrap_or(0.0),
            "tool progress"
        );
    }
    result
}
