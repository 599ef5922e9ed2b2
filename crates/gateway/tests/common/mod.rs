#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use hearth_domain::backend::{BackendStatus, ReconfigRequest, ServiceState};
use hearth_domain::config::Config;
use hearth_domain::error::{Error, Result};
use hearth_domain::generation::{Envelope, GenerationId, Notification};
use hearth_gateway::backend::BackendController;
use hearth_gateway::runtime::{EventSink, Hearth};
use hearth_providers::{ByteStream, ChatRequest, InferenceBackend, ModelInfo};
use hearth_sessions::InMemoryStore;

/// One SSE content frame.
pub fn content_line(text: &str) -> String {
    let payload = serde_json::json!({ "choices": [{ "delta": { "content": text } }] });
    format!("data: {payload}")
}

pub fn reasoning_line(text: &str) -> String {
    let payload =
        serde_json::json!({ "choices": [{ "delta": { "reasoning_content": text } }] });
    format!("data: {payload}")
}

pub const DONE: &str = "data: [DONE]";

/// Answers each chat request with the lines registered for its user
/// message, one line per `pause`.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<Vec<(String, Vec<String>)>>,
    pause: Duration,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(pause: Duration) -> Self {
        Self {
            pause,
            ..Default::default()
        }
    }

    pub fn answer(self, message: &str, lines: Vec<String>) -> Self {
        self.scripts.lock().push((message.to_owned(), lines));
        self
    }
}

#[async_trait::async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn chat_stream(&self, req: &ChatRequest) -> Result<ByteStream> {
        self.requests.lock().push(req.clone());
        let message = req
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let lines = self
            .scripts
            .lock()
            .iter()
            .find(|(m, _)| *m == message)
            .map(|(_, lines)| lines.clone())
            .ok_or_else(|| Error::Http(format!("no script for {message:?}")))?;
        let pause = self.pause;
        let stream = async_stream::stream! {
            for line in lines {
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
                yield Ok::<_, Error>(format!("{line}\n").into_bytes());
            }
        };
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "llama3.2".into(),
            name: "llama3.2".into(),
            size_bytes: 2_019_393_189,
            params: 3_212_749_888,
            context: 131_072,
        }])
    }

    async fn health(&self) -> Result<bool> {
        Ok(true)
    }

    fn backend_id(&self) -> &str {
        "scripted"
    }
}

/// Records restarts; flags any overlap between two of them.
#[derive(Default)]
pub struct FakeController {
    pub restarts: Mutex<Vec<ReconfigRequest>>,
    pub delay: Duration,
    pub configured: bool,
    running: Mutex<usize>,
    pub overlapped: Mutex<bool>,
}

impl FakeController {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl BackendController for FakeController {
    async fn restart(&self, req: &ReconfigRequest) -> Result<()> {
        {
            let mut running = self.running.lock();
            *running += 1;
            if *running > 1 {
                *self.overlapped.lock() = true;
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.restarts.lock().push(req.clone());
        *self.running.lock() -= 1;
        Ok(())
    }

    async fn currently_configured_for(&self, _enabled: bool) -> Result<bool> {
        Ok(self.configured)
    }

    async fn status(&self) -> BackendStatus {
        BackendStatus::new(ServiceState::Ready, "model server is ready")
    }
}

#[derive(Default)]
pub struct Recorder(pub Mutex<Vec<Envelope>>);

impl Recorder {
    pub fn notifications(&self) -> Vec<Notification> {
        self.0.lock().iter().map(|e| e.notification.clone()).collect()
    }

    pub fn texts_for(&self, id: &GenerationId) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match &e.notification {
                Notification::Content { generation_id, text } if generation_id == id => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, pred: impl Fn(&Notification) -> bool) -> Option<usize> {
        self.0.lock().iter().position(|e| pred(&e.notification))
    }
}

#[async_trait::async_trait]
impl EventSink for Recorder {
    async fn deliver(&self, envelope: Envelope) {
        self.0.lock().push(envelope);
    }
}

pub struct Harness {
    pub hearth: Hearth,
    pub backend: Arc<ScriptedBackend>,
    pub controller: Arc<FakeController>,
    pub store: Arc<InMemoryStore>,
    pub sink: Arc<Recorder>,
}

pub fn config(debounce_ms: u64) -> Config {
    let mut config = Config::default();
    config.reconfig.debounce_ms = debounce_ms;
    config
}

pub fn harness(config: &Config, backend: ScriptedBackend, controller: FakeController) -> Harness {
    let backend = Arc::new(backend);
    let controller = Arc::new(controller);
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(Recorder::default());
    let (hearth, _consumer) = Hearth::build(
        config,
        backend.clone(),
        controller.clone(),
        store.clone(),
        sink.clone(),
    );
    Harness {
        hearth,
        backend,
        controller,
        store,
        sink,
    }
}

/// Let spawned tasks and the delivery consumer catch up.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
