pub mod decoder;
pub mod openai_compat;
pub mod reasoning;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use decoder::{DeltaStream, ProtocolDecoder};
pub use openai_compat::OpenAiCompatBackend;
pub use traits::{ByteStream, ChatRequest, InferenceBackend, ModelInfo};
