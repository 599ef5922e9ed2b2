pub mod memory;
pub mod store;
pub mod transcript;

pub use memory::InMemoryStore;
pub use store::ConversationStore;
pub use transcript::TranscriptStore;
