use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Conversation history persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Append-only JSONL file holding the conversation.
    #[serde(default = "d_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: d_path() }
    }
}

fn d_path() -> PathBuf {
    PathBuf::from("./data/conversation.jsonl")
}
