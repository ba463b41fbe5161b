//! The conversational agent and the service that feeds it chat memory.

pub mod agent;
pub mod error;
pub mod executor;
pub mod llm;
pub mod openai;
pub mod prompt;
pub mod service;
pub mod tools;

pub use agent::Agent;
pub use error::{AgentError, Result};
pub use executor::ToolCallingAgent;
pub use llm::{ChatMessage, ChatModel, ChatRole, ToolCall};
pub use openai::OpenAiChatModel;
pub use service::{ConversationService, InboundMessage, Outcome, ReplyStatus};
pub use tools::{DebtLookupTool, Tool, ToolRegistry, ToolSpec};

#[cfg(test)]
mod tests;
