use crate::error::Result;
use async_trait::async_trait;
use cb_session::Turn;

/// Produces a reply to `message` given the conversation so far.
///
/// `history` holds prior turns only, oldest first; `message` is not in it.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn respond(&self, message: &str, history: &[Turn]) -> Result<String>;
}
