//! Application state shared across all handlers.

use cb_agent::{Agent, ConversationService};
use cb_session::SessionStore;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub conversations: ConversationService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<SessionStore>, agent: Arc<dyn Agent>) -> Self {
        Self {
            conversations: ConversationService::new(store, agent),
            start_time: Instant::now(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.conversations.store()
    }
}
