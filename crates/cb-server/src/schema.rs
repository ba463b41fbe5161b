//! Webhook wire format (Z-API style).

use cb_agent::{InboundMessage, Outcome, ReplyStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_my_contact: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub message_id: String,
    pub timestamp: i64,
    pub chat_id: String,
    pub from_me: bool,
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub sender: Option<Sender>,
}

impl From<WebhookPayload> for InboundMessage {
    fn from(payload: WebhookPayload) -> Self {
        InboundMessage::new(payload.chat_id, payload.body).from_me(payload.from_me)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: ReplyStatus,
    pub response: Option<String>,
}

impl From<Outcome> for WebhookResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            status: outcome.status,
            response: outcome.reply,
        }
    }
}
