//! Configuration loading from waypoint.toml.

use std::path::Path;
use std::time::Duration;

use mcp::{DEFAULT_CONNECT_TIMEOUT, Endpoint};
use runtime::{ChatCompletionsBackend, DEFAULT_ENDPOINT, DEFAULT_MODEL, ExchangeOptions, SamplingParams};
use serde::Deserialize;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "waypoint.toml";

/// Environment fallback for `completion.api_key`.
pub const API_KEY_VAR: &str = "SILICONFLOW_API_KEY";

/// Environment fallback for `transport.url`.
pub const MCP_URL_VAR: &str = "AMAP_MCP_URL";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion endpoint configuration.
    pub completion: CompletionConfig,

    /// Tool server connection.
    pub transport: TransportConfig,

    /// Tool names, argument keys and exchange strategy.
    pub tools: ExchangeOptions,
}

/// Completion endpoint configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Full chat-completions URL.
    pub endpoint: String,

    /// Model to use.
    pub model: String,

    /// Bearer token. Falls back to `SILICONFLOW_API_KEY`.
    pub api_key: Option<String>,

    /// System prompt for `chat` and `ask`.
    pub system_prompt: Option<String>,

    pub sampling: SamplingParams,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            system_prompt: None,
            sampling: SamplingParams::default(),
        }
    }
}

/// Tool server connection. Set exactly one of `url` or `command`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Streamable HTTP endpoint. Falls back to `AMAP_MCP_URL`.
    pub url: Option<String>,

    /// Executable of a stdio tool server.
    pub command: Option<String>,

    pub args: Vec<String>,

    pub connect_timeout_ms: u64,

    /// Pause between handshake and first catalog request.
    pub settle_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: None,
            command: None,
            args: Vec::new(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            settle_delay_ms: 0,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
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

    /// Load `path`, or `waypoint.toml` if present, or the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Fill unset secrets and endpoints from the environment.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.completion.api_key.is_none() {
            self.completion.api_key = lookup(API_KEY_VAR);
        }
        if self.transport.url.is_none() && self.transport.command.is_none() {
            self.transport.url = lookup(MCP_URL_VAR);
        }
        self
    }

    /// Build the completion backend.
    pub fn backend(&self) -> Result<ChatCompletionsBackend, ConfigError> {
        let api_key = self
            .completion
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(ChatCompletionsBackend::builder(api_key, &self.completion.model)
            .endpoint(&self.completion.endpoint)
            .sampling(self.completion.sampling.clone())
            .build())
    }

    /// Resolve the tool server endpoint.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        match (&self.transport.url, &self.transport.command) {
            (Some(url), None) => Ok(Endpoint::StreamableHttp { url: url.clone() }),
            (None, Some(command)) => Ok(Endpoint::ChildProcess {
                command: command.clone(),
                args: self.transport.args.clone(),
            }),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousTransport),
            (None, None) => Err(ConfigError::MissingTransport),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("API key not configured: set completion.api_key or {API_KEY_VAR}")]
    MissingApiKey,

    #[error("tool server not configured: set transport.url, transport.command or {MCP_URL_VAR}")]
    MissingTransport,

    #[error("ambiguous transport: set either transport.url OR transport.command, not both")]
    AmbiguousTransport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::ShortCircuit;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.completion.model, "Qwen/QwQ-32B");
        assert_eq!(config.completion.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.completion.sampling, SamplingParams::default());
        assert_eq!(config.transport.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.transport.settle_delay(), Duration::ZERO);
        assert_eq!(config.tools, ExchangeOptions::default());
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::parse(
            r#"
            [completion]
            model = "deepseek-ai/DeepSeek-V3"
            api_key = "sk-test"

            [completion.sampling]
            temperature = 0.2

            [transport]
            url = "https://mcp.amap.com/mcp?key=abc"
            settle_delay_ms = 2000

            [tools]
            distance_tool = "route_distance"
            short_circuit = "disabled"
            "#,
        )
        .unwrap();

        assert_eq!(config.completion.model, "deepseek-ai/DeepSeek-V3");
        assert_eq!(config.completion.sampling.temperature, 0.2);
        assert_eq!(config.completion.sampling.max_tokens, 512);
        assert_eq!(config.transport.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.tools.profile.distance_tool, "route_distance");
        assert_eq!(config.tools.profile.geocode_tool, "maps_geo");
        assert_eq!(config.tools.short_circuit, ShortCircuit::Disabled);

        let backend = config.backend().unwrap();
        assert_eq!(backend.model(), "deepseek-ai/DeepSeek-V3");
        assert!(matches!(config.endpoint().unwrap(), Endpoint::StreamableHttp { .. }));
    }

    #[test]
    fn child_process_transport() {
        let config = Config::parse(
            r#"
            [transport]
            command = "npx"
            args = ["-y", "@amap/amap-maps-mcp-server"]
            "#,
        )
        .unwrap();

        match config.endpoint().unwrap() {
            Endpoint::ChildProcess { command, args } => {
                assert_eq!(command, "npx");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected endpoint {other:?}"),
        }
    }

    #[test]
    fn environment_fills_gaps_only() {
        let env = |name: &str| match name {
            API_KEY_VAR => Some("sk-env".to_string()),
            MCP_URL_VAR => Some("https://mcp.example/mcp".to_string()),
            _ => None,
        };

        let config = Config::default().with_env(env);
        assert_eq!(config.completion.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.transport.url.as_deref(), Some("https://mcp.example/mcp"));

        let config = Config::parse("[completion]\napi_key = \"sk-file\"\n[transport]\ncommand = \"amap-mcp\"")
            .unwrap()
            .with_env(env);
        assert_eq!(config.completion.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.transport.url, None);
    }

    #[test]
    fn missing_settings_are_errors() {
        let config = Config::default().with_env(no_env);
        assert!(matches!(config.backend(), Err(ConfigError::MissingApiKey)));
        assert!(matches!(config.endpoint(), Err(ConfigError::MissingTransport)));

        let config = Config::parse("[transport]\nurl = \"http://a\"\ncommand = \"b\"").unwrap();
        assert!(matches!(config.endpoint(), Err(ConfigError::AmbiguousTransport)));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(Config::parse("[completion"), Err(ConfigError::Parse(_))));
    }
}
