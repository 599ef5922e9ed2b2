use serde::Serialize;
use std::pin::Pin;

/// A boxed async stream, used for backend streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Typed events decoded from a backend's chunked completion stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DecoderEvent {
    /// A fragment of the answer text.
    #[serde(rename = "content_delta")]
    ContentDelta { text: String },

    /// A fragment of the model's reasoning ("thinking") text.
    #[serde(rename = "reasoning_delta")]
    ReasoningDelta { text: String },

    /// The backend signalled the end of the response.
    #[serde(rename = "done")]
    Done,
}
