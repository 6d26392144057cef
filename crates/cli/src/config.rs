//! Configuration loading from mcp-llm.toml and servers JSON files.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use mcp::ServerConfig;
use runtime::model::DEFAULT_TEMPERATURE;
use runtime::{Dispatcher, InitPolicy, OpenAiModel};
use serde::Deserialize;
use serde_json::Value;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "mcp-llm.toml";

const ENV_API_KEY: &str = "LLM_API_KEY";
const ENV_BASE_URL: &str = "LLM_BASE_URL";
const ENV_MODEL_NAME: &str = "LLM_MODEL_NAME";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Tool servers in registration order.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the API; the provider default when unset.
    pub base_url: Option<String>,

    /// Model name sent with each request.
    pub model: Option<String>,

    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub init_policy: InitPolicy,

    /// Upper bound on a single tool call; unbounded when unset.
    pub call_timeout_secs: Option<u64>,
}

/// `{"mcpServers": {name: {command, args, env}}}`
#[derive(Deserialize)]
struct ServersFile {
    #[serde(rename = "mcpServers")]
    mcp_servers: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct ServerEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load `path` if given, else [`DEFAULT_CONFIG_FILE`] if present, else
    /// an empty configuration.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Replace the configured servers with those of a JSON servers file.
    pub fn with_servers_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.servers = parse_servers_json(&content)?;
        Ok(self)
    }

    /// Apply `LLM_*` overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.model.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.model.base_url = Some(url);
        }
        if let Some(name) = lookup(ENV_MODEL_NAME) {
            self.model.model = Some(name);
        }
        self
    }

    /// Build the model client.
    ///
    /// Requires an API key and a model name.
    pub fn model(&self) -> Result<OpenAiModel, ConfigError> {
        let api_key = self
            .model
            .api_key
            .as_deref()
            .ok_or(ConfigError::Missing("model.api_key"))?;
        let name = self
            .model
            .model
            .as_deref()
            .ok_or(ConfigError::Missing("model.model"))?;

        let mut builder = OpenAiModel::builder(api_key, name).temperature(self.model.temperature);
        if let Some(url) = &self.model.base_url {
            builder = builder.base_url(url);
        }
        Ok(builder.build())
    }

    pub fn dispatcher(&self) -> Dispatcher {
        match self.session.call_timeout_secs {
            Some(secs) => Dispatcher::new().with_call_timeout(Duration::from_secs(secs)),
            None => Dispatcher::new(),
        }
    }
}

/// Parse an `mcpServers` JSON document, keeping file order.
pub fn parse_servers_json(json: &str) -> Result<Vec<ServerConfig>, ConfigError> {
    let file: ServersFile =
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;

    file.mcp_servers
        .into_iter()
        .map(|(name, value)| {
            let entry: ServerEntry = serde_json::from_value(value)
                .map_err(|e| ConfigError::Parse(format!("server {name}: {e}")))?;
            let mut config = ServerConfig::new(name, entry.command).with_args(entry.args);
            config.env = entry.env;
            Ok(config)
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
        [model]
        base_url = "http://localhost:11434/v1"
        model = "llama3"
        api_key = "local"
        temperature = 0.2

        [session]
        init_policy = "best-effort"
        call_timeout_secs = 30

        [[servers]]
        name = "search"
        command = "uvx"
        args = ["mcp-server-search"]
        env = { SEARCH_KEY = "abc" }

        [[servers]]
        name = "clock"
        command = "mcp-clock"
    "#;

    #[test]
    fn parse_full_config() {
        let config = Config::parse(FULL).unwrap();

        assert_eq!(config.model.model.as_deref(), Some("llama3"));
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.session.init_policy, InitPolicy::BestEffort);
        assert_eq!(config.session.call_timeout_secs, Some(30));

        let names: Vec<_> = config.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["search", "clock"]);
        assert_eq!(config.servers[0].env["SEARCH_KEY"], "abc");
        assert!(config.servers[1].args.is_empty());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.model.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.session.init_policy, InitPolicy::FailFast);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        assert!(matches!(
            Config::parse("[model\nmodel = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::parse("[session]\ninit_policy = \"sometimes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_model_table() {
        let config = Config::parse(FULL).unwrap().with_overrides(|key| match key {
            ENV_API_KEY => Some("sk-env".into()),
            ENV_MODEL_NAME => Some("gpt-4o-mini".into()),
            _ => None,
        });

        assert_eq!(config.model.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.model.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(
            config.model.base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn model_requires_key_and_name() {
        let config = Config::default();
        assert!(matches!(
            config.model(),
            Err(ConfigError::Missing("model.api_key"))
        ));

        let config = Config::default().with_overrides(|key| {
            (key == ENV_API_KEY).then(|| "sk-test".to_string())
        });
        assert!(matches!(
            config.model(),
            Err(ConfigError::Missing("model.model"))
        ));

        assert!(Config::parse(FULL).unwrap().model().is_ok());
    }

    #[test]
    fn servers_json_keeps_file_order() {
        let servers = parse_servers_json(
            r#"{
                "mcpServers": {
                    "zeta": {"command": "uvx", "args": ["zeta-server"]},
                    "alpha": {"command": "npx", "env": {"TOKEN": "t"}}
                }
            }"#,
        )
        .unwrap();

        let names: Vec<_> = servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(servers[0].args, ["zeta-server"]);
        assert_eq!(servers[1].env["TOKEN"], "t");
    }

    #[test]
    fn servers_json_entry_without_command_is_rejected() {
        let err = parse_servers_json(r#"{"mcpServers": {"broken": {"args": []}}}"#).unwrap_err();
        assert!(err.to_string().contains("server broken"));
    }

    #[test]
    fn load_from_files() {
        let mut toml_file = tempfile::NamedTempFile::new().unwrap();
        toml_file.write_all(FULL.as_bytes()).unwrap();

        let mut json_file = tempfile::NamedTempFile::new().unwrap();
        json_file
            .write_all(br#"{"mcpServers": {"files": {"command": "mcp-files"}}}"#)
            .unwrap();

        let config = Config::discover(Some(toml_file.path()))
            .unwrap()
            .with_servers_file(json_file.path())
            .unwrap();

        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].name, "files");
        assert_eq!(config.model.model.as_deref(), Some("llama3"));
    }

    #[test]
    fn missing_explicit_config_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::discover(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
