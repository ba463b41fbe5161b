//! Message handling: chat memory in, agent reply out.
//!
//! The store lock is never held across the agent call. The history is
//! copied, the lock released, the agent awaited, and the lock retaken only
//! to append the new turns. Two messages for the same chat arriving at once
//! may therefore see the same history and append in either order.

use crate::agent::Agent;
use cb_core::replies;
use cb_session::{Role, SessionStore, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: String,
    pub text: String,
    /// Sent by the bot's own number.
    #[serde(default)]
    pub from_me: bool,
}

impl InboundMessage {
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
            from_me: false,
        }
    }

    pub fn from_me(mut self, from_me: bool) -> Self {
        self.from_me = from_me;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Ignored,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: ReplyStatus,
    pub reply: Option<String>,
}

impl Outcome {
    pub fn success(reply: impl Into<String>) -> Self {
        Self { status: ReplyStatus::Success, reply: Some(reply.into()) }
    }

    pub fn ignored() -> Self {
        Self { status: ReplyStatus::Ignored, reply: None }
    }

    pub fn error(reply: impl Into<String>) -> Self {
        Self { status: ReplyStatus::Error, reply: Some(reply.into()) }
    }
}

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<SessionStore>,
    agent: Arc<dyn Agent>,
}

impl ConversationService {
    pub fn new(store: Arc<SessionStore>, agent: Arc<dyn Agent>) -> Self {
        Self { store, agent }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn handle(&self, message: InboundMessage) -> Outcome {
        let chat_id = message.conversation_id.as_str();

        if message.from_me {
            tracing::debug!(chat_id = %chat_id, "Ignoring message sent by the bot");
            return Outcome::ignored();
        }

        tracing::info!(chat_id = %chat_id, message = %message.text, "Running agent");

        if message.text.trim().is_empty() {
            tracing::warn!(chat_id = %chat_id, "Empty message received");
            return Outcome::success(replies::INVALID_MESSAGE);
        }

        let history = self.store.get_or_create(chat_id).turns();

        match self.agent.respond(&message.text, &history).await {
            Ok(reply) => {
                tracing::info!(chat_id = %chat_id, reply = %reply, "Agent replied");
                self.store.append_turns(
                    chat_id,
                    [Turn::human(message.text.as_str()), Turn::assistant(reply.as_str())],
                );
                Outcome::success(reply)
            }
            Err(e) => {
                tracing::error!(chat_id = %chat_id, error = %e, "Agent failed");
                // The customer's message is kept; the canned apology is not.
                self.store.append_turn(chat_id, Role::Human, message.text.as_str());
                Outcome::error(replies::AGENT_FAILURE)
            }
        }
    }
}
