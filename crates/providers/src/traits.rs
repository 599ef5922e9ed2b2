use hearth_domain::error::Result;
use hearth_domain::message::Message;
use hearth_domain::stream::BoxStream;
use serde::Serialize;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw response body of a streaming completion, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// A streaming chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier sent to the backend.
    pub model: String,
    /// The conversation messages to send (system prompt first).
    pub messages: Vec<Message>,
    /// Sampling temperature. `None` lets the backend choose.
    pub temperature: Option<f32>,
    /// Ask the backend for separate reasoning output.
    pub reasoning: bool,
}

/// A model known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    /// Short name (last path segment of the id).
    pub name: String,
    pub size_bytes: u64,
    pub params: u64,
    pub context: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core backend trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The locally hosted inference server.
///
/// `chat_stream` hands back the undecoded body; callers feed it through a
/// [`crate::DeltaStream`]. Dropping the returned stream closes the
/// connection, which is how an in-flight generation is aborted.
#[async_trait::async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Start a streaming completion and return its body.
    async fn chat_stream(&self, req: &ChatRequest) -> Result<ByteStream>;

    /// List the models the backend can serve.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Whether the backend's API is up and its model loaded.
    async fn health(&self) -> Result<bool>;

    /// A short identifier for logs.
    fn backend_id(&self) -> &str;
}
