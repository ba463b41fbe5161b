//! Tool-calling loop around a [`ChatModel`].

use crate::agent::Agent;
use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel};
use crate::prompt::SYSTEM_PROMPT;
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use cb_core::replies;
use cb_session::Turn;
use std::sync::Arc;

pub struct ToolCallingAgent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    system_prompt: String,
    max_iterations: usize,
}

impl ToolCallingAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_iterations: 15,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn build_messages(&self, message: &str, history: &[Turn]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.as_str()));
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(message));
        messages
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    async fn respond(&self, message: &str, history: &[Turn]) -> Result<String> {
        let mut messages = self.build_messages(message, history);
        let specs = self.tools.specs();

        for iteration in 0..self.max_iterations {
            let reply = self.model.complete(&messages, &specs).await?;
            let calls = reply.requested_calls().to_vec();
            if calls.is_empty() {
                let text = reply
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| replies::NO_OUTPUT.to_string());
                return Ok(text);
            }

            messages.push(reply);
            for call in calls {
                tracing::info!(tool = %call.function.name, iteration, "Agent calling tool");
                // Tool failures go back to the model as text so it can recover.
                let output = match self.tools.invoke(&call.function.name, &call.function.arguments).await {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!(tool = %call.function.name, error = %e, "Tool call failed");
                        format!("Error: {e}")
                    }
                };
                messages.push(ChatMessage::tool_result(call.id, output));
            }
        }

        tracing::warn!(max_iterations = self.max_iterations, "Agent stopped at iteration limit");
        Ok(replies::NO_OUTPUT.to_string())
    }
}
