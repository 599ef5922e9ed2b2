use hearth_domain::error::Result;
use hearth_domain::message::Turn;

/// Conversation history consulted for prompt context and written after each
/// completed generation.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist one completed exchange.
    async fn append(&self, user: &str, assistant: &str) -> Result<()>;

    /// The last `limit` turns, oldest first.
    async fn recent_context(&self, limit: usize) -> Result<Vec<Turn>>;

    /// Forget the whole history.
    async fn clear(&self) -> Result<()>;
}

/// Tail of `turns` holding at most `limit` entries.
pub(crate) fn tail(turns: &[Turn], limit: usize) -> Vec<Turn> {
    let start = turns.len().saturating_sub(limit);
    turns[start..].to_vec()
}
