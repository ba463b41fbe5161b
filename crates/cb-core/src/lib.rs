pub mod config;
pub mod error;
pub mod replies;

pub use config::{AgentConfig, BotConfig, ServerConfig, SessionConfig, MAX_HISTORY_WINDOW};
pub use error::{BotError, Result};
