mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use hearth_domain::config::Config;
use hearth_domain::message::Turn;
use hearth_gateway::api;
use hearth_gateway::runtime::{BroadcastSink, EventSink, Hearth};
use hearth_gateway::state::AppState;
use hearth_sessions::{ConversationStore, InMemoryStore};

use common::*;

struct App {
    router: Router,
    events: BroadcastSink,
    store: Arc<InMemoryStore>,
    controller: Arc<FakeController>,
}

fn app(config: Config, backend: ScriptedBackend) -> App {
    let config = Arc::new(config);
    let backend = Arc::new(backend);
    let controller = Arc::new(FakeController::default());
    let store = Arc::new(InMemoryStore::with_turns(vec![
        Turn::new("hello", "hi there"),
        Turn::new("2+2?", "4"),
    ]));
    let events = BroadcastSink::new(64);
    let sink: Arc<dyn EventSink> = Arc::new(events.clone());
    let (hearth, _consumer) = Hearth::build(
        &config,
        backend.clone(),
        controller.clone(),
        store.clone(),
        sink,
    );
    let state = AppState {
        config,
        hearth,
        backend,
        controller: controller.clone(),
        events: events.clone(),
        started_at: Instant::now(),
    };
    App {
        router: api::router().with_state(state),
        events,
        store,
        controller,
    }
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            req = req.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let resp = router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app(config(0), ScriptedBackend::default());
    let (status, body) = call(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn started_generation_streams_to_subscribers() {
    let backend = ScriptedBackend::default().answer("ping", vec![content_line("pong"), DONE.into()]);
    let app = app(config(0), backend);
    let mut rx = app.events.subscribe();

    let (status, body) = call(
        &app.router,
        Method::POST,
        "/v1/generations",
        Some(serde_json::json!({ "message": "ping" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = body["generation_id"].as_str().unwrap().to_owned();

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    let first = serde_json::to_value(&first).unwrap();
    let second = serde_json::to_value(&second).unwrap();
    assert_eq!(first["type"], "content");
    assert_eq!(first["text"], "pong");
    assert_eq!(first["generation_id"], id.as_str());
    assert_eq!(second["type"], "complete");
    assert!(second["seq"].as_u64().unwrap() > first["seq"].as_u64().unwrap());

    // Finished generations are no longer live.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let (status, body) = call(&app.router, Method::GET, &format!("/v1/generations/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = app(config(0), ScriptedBackend::default());
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/v1/generations",
        Some(serde_json::json!({ "message": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn cancelling_unknown_generation_reports_false() {
    let app = app(config(0), ScriptedBackend::default());
    let (status, body) = call(&app.router, Method::DELETE, "/v1/generations/gen_1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn reconfigure_applies_and_backend_reports_settings() {
    let app = app(config(0), ScriptedBackend::default());
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/v1/backend/reconfigure",
        Some(serde_json::json!({ "enabled": true, "mode": "strict" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(app.controller.restarts.lock().len(), 1);

    let (status, body) = call(&app.router, Method::GET, "/v1/backend", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["augmentation_enabled"], true);
    assert_eq!(body["settings"]["mode"], "strict");
    assert_eq!(body["reconfiguration"], "idle");
    assert_eq!(body["status"]["state"], "ready");
    assert_eq!(body["unit"], "ramalama.service");
    assert_eq!(body["debounce_ms"], 0);
}

#[tokio::test]
async fn debounced_reconfigure_is_accepted() {
    let app = app(config(1_000), ScriptedBackend::default());
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/v1/backend/reconfigure",
        Some(serde_json::json!({ "enabled": false, "mode": "nonsense" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["outcome"], "scheduled");
}

#[tokio::test]
async fn models_are_listed() {
    let app = app(config(0), ScriptedBackend::default());
    let (status, body) = call(&app.router, Method::GET, "/v1/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"][0]["id"], "llama3.2");
    assert_eq!(body["configured"], "llama3.2");
}

#[tokio::test]
async fn conversation_can_be_read_and_cleared() {
    let app = app(config(0), ScriptedBackend::default());

    let (status, body) = call(&app.router, Method::GET, "/v1/conversation?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["turns"][0]["user"], "2+2?");

    let (status, body) = call(&app.router, Method::DELETE, "/v1/conversation", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], true);
    assert!(app.store.recent_context(10).await.unwrap().is_empty());
}
