//! Configuration surface: client defaults, server descriptors and AI
//! settings, loaded from TOML with environment overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{FleetError, FleetResult};

/// Environment variable carrying the generative-API key. The key is never
/// read from a configuration file.
pub const API_KEY_ENV: &str = "FLEET_AI_API_KEY";

fn default_true() -> bool {
    true
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    /// MCP client and server-fleet settings
    #[serde(default)]
    pub mcp: McpConfig,

    /// AI layer settings
    #[serde(default)]
    pub ai: AiConfig,
}

/// The `mcp` namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub client: ClientDefaults,

    /// server-id → descriptor
    #[serde(default)]
    pub servers: HashMap<String, ServerDescriptor>,
}

/// Client-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDefaults {
    /// Per-request timeout applied when a descriptor carries none
    pub default_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientDefaults {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Retry posture for callers above the transport; the transport itself never
/// retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_multiplier: 2.0,
        }
    }
}

/// How to reach one MCP server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerDescriptor {
    #[serde(flatten)]
    pub endpoint: ServerEndpoint,

    /// Per-request timeout override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Transport half of a descriptor: a spawned child process or an HTTP
/// endpoint. The registry never branches on this past construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEndpoint {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        environment: HashMap<String, String>,
    },
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl ServerDescriptor {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            endpoint: ServerEndpoint::Stdio {
                command: command.into(),
                args,
                environment: HashMap::new(),
            },
            timeout_ms: None,
            enabled: true,
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self {
            endpoint: ServerEndpoint::Http {
                url: url.into(),
                headers: HashMap::new(),
            },
            timeout_ms: None,
            enabled: true,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn timeout(&self, defaults: &ClientDefaults) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| defaults.default_timeout())
    }

    fn validate(&self, id: &str) -> FleetResult<()> {
        if let Some(0) = self.timeout_ms {
            return Err(FleetError::Validation(format!(
                "server '{id}': timeout_ms must be positive"
            )));
        }
        match &self.endpoint {
            ServerEndpoint::Stdio { command, .. } => {
                if command.is_empty() {
                    return Err(FleetError::Validation(format!(
                        "server '{id}': stdio descriptor requires a command"
                    )));
                }
            }
            ServerEndpoint::Http { url: raw, .. } => {
                url::Url::parse(raw).map_err(|e| {
                    FleetError::Validation(format!("server '{id}': invalid url '{raw}': {e}"))
                })?;
            }
        }
        Ok(())
    }
}

/// The `ai` namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,

    pub provider: String,

    /// Default model name; the selector may substitute the fast or
    /// reasoning tier
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_model: Option<String>,

    /// Base URL of the generative endpoint
    pub base_url: String,

    /// Server id the pattern fallback targets in generated commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_server: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "generative".to_string(),
            model: "text-large-002".to_string(),
            fast_model: None,
            reasoning_model: None,
            base_url: "https://generativelanguage.example.com/v1".to_string(),
            default_server: None,
        }
    }
}

impl FleetConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> FleetResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FleetError::Validation(format!("failed to read config {}: {e}", path.display()))
        })?;
        let config: FleetConfig = toml::from_str(&content).map_err(|e| {
            FleetError::Parse(format!("failed to parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> FleetResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FleetError::Internal(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content).map_err(|e| {
            FleetError::Validation(format!("failed to write config {}: {e}", path.display()))
        })?;
        Ok(())
    }

    /// Environment overrides, applied after file loading.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("FLEET_MCP_DEFAULT_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.mcp.client.default_timeout_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("FLEET_AI_ENABLED") {
            self.ai.enabled = val.parse().unwrap_or(self.ai.enabled);
        }
        if let Ok(val) = std::env::var("FLEET_AI_MODEL") {
            self.ai.model = val;
        }
        if let Ok(val) = std::env::var("FLEET_AI_BASE_URL") {
            self.ai.base_url = val;
        }
    }

    pub fn validate(&self) -> FleetResult<()> {
        if self.mcp.client.default_timeout_ms == 0 {
            return Err(FleetError::Validation(
                "mcp.client.default_timeout_ms must be positive".to_string(),
            ));
        }
        if self.mcp.client.retry.max_attempts == 0 {
            return Err(FleetError::Validation(
                "mcp.client.retry.max_attempts must be positive".to_string(),
            ));
        }
        if self.mcp.client.retry.backoff_multiplier <= 0.0 {
            return Err(FleetError::Validation(
                "mcp.client.retry.backoff_multiplier must be positive".to_string(),
            ));
        }
        for (id, descriptor) in &self.mcp.servers {
            descriptor.validate(id)?;
        }
        Ok(())
    }

    /// The generative-API key, from the environment only.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [mcp.client]
        default_timeout_ms = 15000

        [mcp.client.retry]
        max_attempts = 4
        backoff_multiplier = 1.5

        [mcp.servers.docs]
        type = "stdio"
        command = "docs-mcp"
        args = ["--root", "/srv/docs"]
        timeout_ms = 5000

        [mcp.servers.search]
        type = "http"
        url = "https://search.internal/mcp"
        headers = { "x-api-key" = "k" }
        enabled = false

        [ai]
        enabled = true
        provider = "generative"
        model = "text-large-002"
        base_url = "https://llm.internal/v1"
        default_server = "docs"
    "#;

    #[test]
    fn parses_full_config() {
        let config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.mcp.client.default_timeout_ms, 15_000);
        assert_eq!(config.mcp.servers.len(), 2);

        let docs = &config.mcp.servers["docs"];
        assert!(docs.enabled);
        assert_eq!(docs.timeout(&config.mcp.client), Duration::from_secs(5));
        assert!(matches!(
            docs.endpoint,
            ServerEndpoint::Stdio { ref command, .. } if command == "docs-mcp"
        ));

        let search = &config.mcp.servers["search"];
        assert!(!search.enabled);
        assert_eq!(
            search.timeout(&config.mcp.client),
            Duration::from_millis(15_000)
        );
    }

    #[test]
    fn rejects_bad_url() {
        let mut config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        config
            .mcp
            .servers
            .insert("bad".to_string(), ServerDescriptor::http("not a url"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        config.mcp.client.default_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");

        let config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        config.save(&path).unwrap();
        let loaded = FleetConfig::load(&path).unwrap();

        assert_eq!(loaded.mcp.servers["docs"], config.mcp.servers["docs"]);
        assert_eq!(loaded.ai.default_server.as_deref(), Some("docs"));
    }
}
