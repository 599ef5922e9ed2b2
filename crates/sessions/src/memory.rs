//! Volatile conversation store, used by the one-shot CLI and in tests.

use hearth_domain::error::Result;
use hearth_domain::message::Turn;
use parking_lot::Mutex;

use crate::store::{tail, ConversationStore};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    turns: Mutex<Vec<Turn>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns),
        }
    }

    /// Snapshot of every stored turn.
    pub fn turns(&self) -> Vec<Turn> {
        self.turns.lock().clone()
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryStore {
    async fn append(&self, user: &str, assistant: &str) -> Result<()> {
        self.turns.lock().push(Turn::new(user, assistant));
        Ok(())
    }

    async fn recent_context(&self, limit: usize) -> Result<Vec<Turn>> {
        Ok(tail(&self.turns.lock(), limit))
    }

    async fn clear(&self) -> Result<()> {
        self.turns.lock().clear();
        Ok(())
    }
}
