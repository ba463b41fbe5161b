//! Command-line flags and environment overrides.

use cb_core::{BotConfig, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "cb-server", version, about = "Collection bot webhook server")]
pub struct Cli {
    /// TOML config file; flags and environment variables override it.
    #[arg(long, env = "BOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "BOT_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "BOT_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "BOT_MODEL")]
    pub model: Option<String>,

    /// OpenAI-compatible API base URL.
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Turns of history kept per chat.
    #[arg(long, env = "BOT_HISTORY_WINDOW")]
    pub history_window: Option<usize>,

    /// Idle seconds before a chat's memory is dropped.
    #[arg(long, env = "BOT_SESSION_TTL_SECS")]
    pub session_ttl_secs: Option<u64>,

    #[arg(long, env = "BOT_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: Option<u64>,

    /// -v for debug, -vv for trace. RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Resolve the final config: file (or defaults), then flags.
    pub fn into_config(self) -> Result<BotConfig> {
        let mut config = match &self.config {
            Some(path) => BotConfig::load(path)?,
            None => BotConfig::default(),
        };
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(model) = self.model {
            config.agent.model = model;
        }
        if let Some(base_url) = self.base_url {
            config.agent.base_url = base_url;
        }
        if self.api_key.is_some() {
            config.agent.api_key = self.api_key;
        }
        if let Some(window) = self.history_window {
            config.session.history_window = window;
        }
        if let Some(ttl) = self.session_ttl_secs {
            config.session.ttl_secs = ttl;
        }
        if let Some(interval) = self.sweep_interval_secs {
            config.session.sweep_interval_secs = interval;
        }
        config.validate()?;
        Ok(config)
    }
}
