//! Conversation session: owns the servers, catalog and history, and drives
//! each turn through model → parser → dispatcher → model.

use std::fmt;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::ToolCatalog;
use crate::dispatch::{Dispatch, Dispatcher, ToolResults};
use crate::model::{Message, Model};
use crate::parser::{self, ParsedResponse};
use crate::prompt;
use crate::tools::{ToolServer, ToolServerHandle};
use crate::{Error, Result};

/// Unique identifier of a session, used to correlate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What happens when some servers fail to initialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitPolicy {
    /// Any failure aborts initialization.
    #[default]
    FailFast,
    /// Continue with the servers that came up.
    BestEffort,
}

/// The user-visible result of a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TurnOutcome {
    /// The model answered without tools; its text is returned verbatim.
    Direct(String),
    /// Tools ran and the model summarized their results.
    Answered { answer: String, results: ToolResults },
}

impl TurnOutcome {
    /// The text to show the user.
    pub fn text(&self) -> &str {
        match self {
            Self::Direct(text) => text,
            Self::Answered { answer, .. } => answer,
        }
    }

    pub fn results(&self) -> Option<&ToolResults> {
        match self {
            Self::Direct(_) => None,
            Self::Answered { results, .. } => Some(results),
        }
    }
}

/// A conversation with a model and a fixed set of tool servers.
///
/// Lifecycle: [`new`](Self::new) → [`initialize`](Self::initialize) →
/// any number of [`run_turn`](Self::run_turn) → [`cleanup`](Self::cleanup).
pub struct Session<M, S> {
    pub id: SessionId,
    model: M,
    servers: Vec<ToolServerHandle<S>>,
    dispatcher: Dispatcher,
    policy: InitPolicy,
    catalog: Option<ToolCatalog>,
    history: Vec<Message>,
}

impl<M: Model, S: ToolServer> Session<M, S> {
    /// Create a session. Servers are registered in the given order.
    pub fn new(model: M, servers: Vec<ToolServerHandle<S>>) -> Self {
        Self {
            id: SessionId::new(),
            model,
            servers,
            dispatcher: Dispatcher::new(),
            policy: InitPolicy::default(),
            catalog: None,
            history: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: InitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn servers(&self) -> &[ToolServerHandle<S>] {
        &self.servers
    }

    /// The catalog, once initialized.
    pub fn catalog(&self) -> Option<&ToolCatalog> {
        self.catalog.as_ref()
    }

    /// Committed messages, system prompt first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Bring up every server, build the catalog and seed the system prompt.
    ///
    /// Servers initialize concurrently. Under [`InitPolicy::FailFast`] the
    /// first failure (in registration order) is returned and the session
    /// stays uninitialized.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.catalog.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let outcomes = join_all(self.servers.iter_mut().map(|h| h.initialize())).await;
        for outcome in outcomes {
            let Err(e) = outcome else { continue };
            match self.policy {
                InitPolicy::FailFast => return Err(e),
                InitPolicy::BestEffort => warn!(session = %self.id, error = %e, "continuing without server"),
            }
        }

        let catalog = ToolCatalog::build(&self.servers);
        info!(
            session = %self.id,
            servers = self.servers.iter().filter(|h| h.is_ready()).count(),
            tools = catalog.len(),
            "session initialized"
        );
        self.history = vec![Message::system(prompt::system_prompt(&catalog))];
        self.catalog = Some(catalog);
        Ok(())
    }

    /// Run one user turn.
    ///
    /// The turn's messages are committed to history only once it completes;
    /// dropping the future mid-turn leaves the history untouched.
    pub async fn run_turn(&mut self, user_text: &str) -> Result<TurnOutcome> {
        if user_text.trim().is_empty() {
            return Err(Error::InvalidInput("empty user message".into()));
        }
        let catalog = self.catalog.as_ref().ok_or(Error::NotInitialized)?;

        let mut turn = vec![Message::user(user_text)];
        let reply = complete(&self.model, &self.history, &turn).await?;

        let requests = match parser::parse(&reply) {
            ParsedResponse::ToolCalls(requests) => requests,
            ParsedResponse::NoToolCalls => Vec::new(),
        };
        info!(session = %self.id, calls = requests.len(), "model replied");

        let results = match self.dispatcher.dispatch(requests, catalog, &self.servers).await {
            Dispatch::Results(results) => results,
            Dispatch::NoCalls => {
                turn.push(Message::assistant(reply.clone()));
                self.history.extend(turn);
                return Ok(TurnOutcome::Direct(reply));
            }
        };

        turn.push(Message::assistant(reply));
        turn.push(Message::system(prompt::tool_results_message(&results)?));
        let answer = complete(&self.model, &self.history, &turn).await?;
        turn.push(Message::assistant(answer.clone()));

        self.history.extend(turn);
        Ok(TurnOutcome::Answered { answer, results })
    }

    /// Tear down every server. Errors are logged, never returned.
    pub async fn cleanup(&mut self) {
        for handle in &mut self.servers {
            if let Err(e) = handle.cleanup().await {
                warn!(session = %self.id, server = %handle.id(), error = %e, "cleanup failed");
            }
        }
        info!(session = %self.id, "session cleaned up");
    }
}

async fn complete<M: Model>(model: &M, history: &[Message], turn: &[Message]) -> Result<String> {
    let messages: Vec<Message> = history.iter().chain(turn).cloned().collect();
    Ok(model.complete(&messages).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedModel, StaticToolServer};
    use crate::model::Role;
    use crate::tools::ToolDescriptor;
    use serde_json::json;

    fn clock() -> ToolServerHandle<StaticToolServer> {
        ToolServerHandle::new(
            "clock",
            StaticToolServer::new().with_tool(
                ToolDescriptor::new("now", "Current time", json!({"type": "object"})),
                json!("12:00"),
            ),
        )
    }

    #[tokio::test]
    async fn initialize_seeds_system_prompt_once() {
        let mut session = Session::new(ScriptedModel::default(), vec![clock()]);
        session.initialize().await.unwrap();

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, Role::System);
        assert!(session.history()[0].content.contains("Tool: now"));
        assert!(matches!(session.initialize().await, Err(Error::AlreadyInitialized)));
    }

    #[tokio::test]
    async fn run_turn_requires_initialize() {
        let mut session = Session::new(ScriptedModel::new(["hello"]), vec![clock()]);
        assert!(matches!(session.run_turn("hi").await, Err(Error::NotInitialized)));
        assert_eq!(session.model().call_count(), 0);
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let mut session = Session::new(ScriptedModel::new(["hello"]), vec![clock()]);
        session.initialize().await.unwrap();
        assert!(matches!(session.run_turn("   ").await, Err(Error::InvalidInput(_))));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn best_effort_continues_without_failed_server() {
        let broken = ToolServerHandle::new("broken", StaticToolServer::failing("refused"));
        let mut session = Session::new(ScriptedModel::default(), vec![broken, clock()])
            .with_policy(InitPolicy::BestEffort);

        session.initialize().await.unwrap();
        let catalog = session.catalog().unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["now"]);
    }

    #[test]
    fn outcome_serializes_for_host() {
        let direct = TurnOutcome::Direct("just text".into());
        assert_eq!(serde_json::to_value(&direct).unwrap(), json!("just text"));
        assert_eq!(direct.text(), "just text");
        assert!(direct.results().is_none());
    }

    #[test]
    fn init_policy_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: InitPolicy,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"policy": "best-effort"}"#).unwrap();
        assert_eq!(parsed.policy, InitPolicy::BestEffort);
    }
}
