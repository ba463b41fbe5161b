//! OpenAI-compatible chat-completions client.

use crate::error::{AgentError, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::tools::ToolSpec;
use async_trait::async_trait;
use cb_core::AgentConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition<'a>>,
}

#[derive(Debug, Serialize)]
struct ToolDefinition<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self> {
        Self::with_client(Client::builder().build()?, base_url, api_key, model, temperature)
    }

    pub fn with_client(
        client: Client,
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey);
        }
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.as_ref().trim_end_matches('/')),
            api_key,
            model: model.into(),
            temperature,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or(AgentError::MissingApiKey)?;
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Self::with_client(client, &config.base_url, api_key, &config.model, config.temperature)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
            tools: tools
                .iter()
                .map(|function| ToolDefinition { kind: "function", function })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AgentError::Api {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }
        parse_response(&body)
    }
}

/// Pull the first choice's message out of a chat-completions body.
pub fn parse_response(body: &str) -> Result<ChatMessage> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| AgentError::Decode(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or(AgentError::EmptyResponse)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
