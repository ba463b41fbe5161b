use crate::error::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest accepted `session.history_window`.
pub const MAX_HISTORY_WINDOW: usize = 1_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of most recent turns kept per chat.
    pub history_window: usize,
    /// Idle time after which a chat's memory is dropped.
    pub ttl_secs: u64,
    /// How often the sweeper looks for idle chats.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    /// Read from the environment in the binary; never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Upper bound on model round-trips per message (tool calls included).
    pub max_iterations: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: 20,
            ttl_secs: 30 * 60,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.0,
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            max_iterations: 15,
            request_timeout_secs: 60,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BotConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.history_window == 0 {
            return Err(BotError::InvalidConfig("session.history_window must be at least 1".into()));
        }
        if self.session.history_window > MAX_HISTORY_WINDOW {
            return Err(BotError::InvalidConfig(format!(
                "session.history_window must be at most {MAX_HISTORY_WINDOW}"
            )));
        }
        if self.session.ttl_secs == 0 {
            return Err(BotError::InvalidConfig("session.ttl_secs must be positive".into()));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(BotError::InvalidConfig("session.sweep_interval_secs must be positive".into()));
        }
        if self.agent.max_iterations == 0 {
            return Err(BotError::InvalidConfig("agent.max_iterations must be at least 1".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
