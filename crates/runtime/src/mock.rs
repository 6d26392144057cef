//! In-memory model and tool server for tests and examples.
//!
//! [`ScriptedModel`] replays canned completions and records every prompt it
//! was given. [`StaticToolServer`] serves a fixed set of tools whose
//! outputs, failures and delays are configured up front, and counts its
//! lifecycle side effects.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::model::{Message, Model, ModelError};
use crate::tools::{Progress, ServerError, ToolDescriptor, ToolOutput, ToolServer};

/// Model that returns queued replies in order.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every history the model was called with, oldest first.
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Model for ScriptedModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| ModelError::Api("script exhausted".into()))
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Reply(ToolOutput),
    Delayed(Duration, Value),
    Remote(String),
    Transport(String),
}

/// Tool server backed by a fixed table of tools.
#[derive(Debug, Default)]
pub struct StaticToolServer {
    tools: Vec<(ToolDescriptor, Behavior)>,
    connect_error: Option<String>,
    connect_attempts: AtomicUsize,
    close_count: AtomicUsize,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl StaticToolServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A server whose handshake always fails.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            connect_error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_tool(self, descriptor: ToolDescriptor, output: Value) -> Self {
        self.push(descriptor, Behavior::Reply(ToolOutput::new(output)))
    }

    pub fn with_progress(self, descriptor: ToolDescriptor, output: Value, progress: Progress) -> Self {
        let output = ToolOutput::new(output).with_progress(progress);
        self.push(descriptor, Behavior::Reply(output))
    }

    pub fn with_delay(self, descriptor: ToolDescriptor, delay: Duration, output: Value) -> Self {
        self.push(descriptor, Behavior::Delayed(delay, output))
    }

    pub fn with_remote_failure(self, descriptor: ToolDescriptor, reason: impl Into<String>) -> Self {
        self.push(descriptor, Behavior::Remote(reason.into()))
    }

    pub fn with_transport_failure(self, descriptor: ToolDescriptor, reason: impl Into<String>) -> Self {
        self.push(descriptor, Behavior::Transport(reason.into()))
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Calls received so far as `(tool, arguments)`, in arrival order.
    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(mut self, descriptor: ToolDescriptor, behavior: Behavior) -> Self {
        self.tools.push((descriptor, behavior));
        self
    }
}

impl ToolServer for StaticToolServer {
    async fn connect(&mut self) -> Result<Vec<ToolDescriptor>, ServerError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.connect_error {
            return Err(ServerError::Transport(reason.clone()));
        }
        Ok(self.tools.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolOutput, ServerError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_string(), arguments.clone()));

        let behavior = self
            .tools
            .iter()
            .find(|(d, _)| d.name == name)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| ServerError::Remote(format!("no such tool: {name}")))?;

        match behavior {
            Behavior::Reply(output) => Ok(output),
            Behavior::Delayed(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(ToolOutput::new(value))
            }
            Behavior::Remote(reason) => Err(ServerError::Remote(reason)),
            Behavior::Transport(reason) => Err(ServerError::Transport(reason)),
        }
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
