use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Could not decode model response: {0}")]
    Decode(String),
    #[error("Model response had no choices")]
    EmptyResponse,
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for tool {tool}: {reason}")]
    InvalidToolArguments { tool: String, reason: String },
    #[error("Tool {tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },
    #[error("No API key configured for the model provider")]
    MissingApiKey,
}

pub type Result<T> = std::result::Result<T, AgentError>;
