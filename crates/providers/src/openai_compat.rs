//! OpenAI-compatible adapter for the local model server.
//!
//! Works with llama.cpp's server (as launched by ramalama), Ollama, vLLM and
//! any other endpoint that follows the chat completions streaming contract.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use hearth_domain::config::BackendConfig;
use hearth_domain::error::{Error, Result};
use hearth_domain::message::Message;
use hearth_domain::trace::TraceEvent;
use serde_json::Value;

use crate::traits::{ByteStream, ChatRequest, InferenceBackend, ModelInfo};
use crate::util::{from_reqwest, truncate};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const LIST_TIMEOUT: Duration = Duration::from_secs(5);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Streaming client for an OpenAI-compatible model server.
///
/// Only the connect phase is bounded; a streamed completion may run for as
/// long as the model keeps producing tokens.
pub struct OpenAiCompatBackend {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    pub fn from_config(cfg: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "openai_compat".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_chat_body(req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();
        let mut body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "stream": true,
        });
        if let Some(t) = req.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if req.reasoning {
            body["reasoning"] = Value::Bool(true);
        }
        body
    }

    fn status_error(&self, status: reqwest::StatusCode, body: &str) -> Error {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| truncate(body.trim(), 200).to_owned());

        let message = if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            format!("model is still loading, try again shortly ({detail})")
        } else {
            format!("HTTP {} - {}", status.as_u16(), detail)
        };
        Error::Provider {
            provider: self.id.clone(),
            message,
        }
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    serde_json::json!({
        "role": msg.role.as_str(),
        "content": msg.content,
    })
}

/// Parse a `/v1/models` listing. Accepts the `data` array of the OpenAI
/// shape and the `models` array some servers use instead.
fn parse_models(body: &Value) -> Vec<ModelInfo> {
    let entries = body
        .get("data")
        .or_else(|| body.get("models"))
        .and_then(Value::as_array);
    let Some(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = entry
                .get("id")
                .or_else(|| entry.get("model"))
                .or_else(|| entry.get("name"))
                .and_then(Value::as_str)?;
            let meta = entry.get("meta");
            let num = |key: &str| {
                meta.and_then(|m| m.get(key))
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
            };
            Some(ModelInfo {
                id: id.to_owned(),
                name: id.rsplit('/').next().unwrap_or(id).to_owned(),
                size_bytes: num("size"),
                params: num("n_params"),
                context: num("n_ctx_train"),
            })
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl InferenceBackend for OpenAiCompatBackend {
    async fn chat_stream(&self, req: &ChatRequest) -> Result<ByteStream> {
        let url = self.url("/v1/chat/completions");
        let body = Self::build_chat_body(req);
        let started = Instant::now();

        tracing::debug!(backend = %self.id, url = %url, model = %req.model, "stream request");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        TraceEvent::BackendRequest {
            model: req.model.clone(),
            reasoning: req.reasoning,
            status: status.as_u16(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(self.status_error(status, &err_text));
        }

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(from_reqwest));
        Ok(Box::pin(body))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let resp = self
            .client
            .get(self.url("/v1/models"))
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(self.status_error(status, &text));
        }
        let body: Value = serde_json::from_str(&text)?;
        Ok(parse_models(&body))
    }

    async fn health(&self) -> Result<bool> {
        let resp = self
            .client
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !resp.status().is_success() {
            return Ok(false);
        }
        // llama.cpp answers `{"status":"ok"}`; anything else 2xx counts as up.
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        Ok(match body.get("status").and_then(Value::as_str) {
            Some(s) => s == "ok",
            None => true,
        })
    }

    fn backend_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
