mod common;

use std::time::Duration;

use hearth_domain::backend::{AugmentMode, ReconfigOutcome, ReconfigRequest};
use hearth_domain::generation::{GenerationStatus, Notification};
use hearth_domain::message::Turn;
use hearth_gateway::runtime::CoordinatorState;

use common::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn simple_answer_is_delivered_then_completed_and_stored() {
    let backend = ScriptedBackend::default().answer("2+2?", vec![content_line("4"), DONE.into()]);
    let h = harness(&config(0), backend, FakeController::default());

    let ticket = h.hearth.start_generation("2+2?".into()).await;
    assert_eq!(h.hearth.current_generation(), Some(ticket.id.clone()));
    let outcome = ticket.handle.await.unwrap();
    settle().await;

    assert_eq!(outcome.status, GenerationStatus::Completed);
    assert_eq!(
        h.sink.notifications(),
        vec![
            Notification::Content {
                generation_id: ticket.id.clone(),
                text: "4".into()
            },
            Notification::Complete {
                generation_id: ticket.id.clone(),
                status: GenerationStatus::Completed
            },
        ]
    );
    assert_eq!(h.store.turns(), vec![Turn::new("2+2?", "4")]);
    assert!(h.hearth.current_generation().is_none());
}

#[tokio::test]
async fn malformed_line_is_skipped() {
    let backend = ScriptedBackend::default().answer(
        "hi",
        vec![content_line("hello"), "data: {not json".into(), DONE.into()],
    );
    let h = harness(&config(0), backend, FakeController::default());

    let ticket = h.hearth.start_generation("hi".into()).await;
    let outcome = ticket.handle.await.unwrap();
    settle().await;

    assert_eq!(outcome.status, GenerationStatus::Completed);
    assert_eq!(h.sink.texts_for(&ticket.id), vec!["hello"]);
}

#[tokio::test]
async fn reasoning_precedes_content_and_is_not_stored() {
    let backend = ScriptedBackend::default().answer(
        "why?",
        vec![reasoning_line("thinking"), content_line("because"), DONE.into()],
    );
    let h = harness(&config(0), backend, FakeController::default());

    let outcome = h.hearth.start_generation("why?".into()).await.handle.await.unwrap();
    settle().await;

    assert_eq!(outcome.reasoning, "thinking");
    let kinds: Vec<&str> = h.sink.notifications().iter().map(|n| n.kind()).collect();
    assert_eq!(kinds, vec!["reasoning", "content", "complete"]);
    assert_eq!(h.store.turns(), vec![Turn::new("why?", "because")]);
}

#[tokio::test]
async fn stored_history_is_sent_as_context() {
    let backend = ScriptedBackend::default()
        .answer("first", vec![content_line("one"), DONE.into()])
        .answer("second", vec![content_line("two"), DONE.into()]);
    let h = harness(&config(0), backend, FakeController::default());

    h.hearth.start_generation("first".into()).await.handle.await.unwrap();
    h.hearth.start_generation("second".into()).await.handle.await.unwrap();

    let requests = h.backend.requests.lock();
    let contents: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(&contents[1..], &["first", "one", "second"]);
}

#[tokio::test(start_paused = true)]
async fn newest_generation_is_current_and_stale_deltas_never_arrive() {
    let backend = ScriptedBackend::new(Duration::from_millis(100))
        .answer(
            "old",
            vec![content_line("o1"), content_line("o2"), content_line("o3"), DONE.into()],
        )
        .answer(
            "new",
            vec![content_line("n1"), content_line("n2"), content_line("n3"), content_line("n4"), DONE.into()],
        );
    let h = harness(&config(0), backend, FakeController::default());

    let old = h.hearth.start_generation("old".into()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    let new = h.hearth.start_generation("new".into()).await;
    assert_eq!(h.hearth.current_generation(), Some(new.id.clone()));

    let old_outcome = old.handle.await.unwrap();
    // The stale worker finishing does not clear the newer generation.
    assert_eq!(h.hearth.current_generation(), Some(new.id.clone()));
    new.handle.await.unwrap();
    settle().await;

    assert_eq!(old_outcome.content, "o1o2o3");
    assert_eq!(h.sink.texts_for(&old.id), vec!["o1"]);
    assert_eq!(h.sink.texts_for(&new.id), vec!["n1", "n2", "n3", "n4"]);
    assert!(h.hearth.current_generation().is_none());

    // Both generations still end with a Complete.
    let completes = h
        .sink
        .notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::Complete { .. }))
        .count();
    assert_eq!(completes, 2);
    assert_eq!(h.store.turns(), vec![Turn::new("new", "n1n2n3n4")]);
}

#[tokio::test(start_paused = true)]
async fn immediate_cancel_still_completes_without_content() {
    let backend = ScriptedBackend::new(Duration::from_millis(50))
        .answer("long", vec![content_line("a"), content_line("b"), DONE.into()]);
    let h = harness(&config(0), backend, FakeController::default());

    let ticket = h.hearth.start_generation("long".into()).await;
    assert!(h.hearth.cancel_generation(&ticket.id));
    let outcome = ticket.handle.await.unwrap();
    settle().await;

    assert_eq!(outcome.status, GenerationStatus::Cancelled);
    assert_eq!(
        h.sink.notifications(),
        vec![Notification::Complete {
            generation_id: ticket.id.clone(),
            status: GenerationStatus::Cancelled
        }]
    );
    assert!(h.store.turns().is_empty());
    // Cancelling again is a no-op.
    assert!(!h.hearth.cancel_generation(&ticket.id));
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_stream_keeps_partial_output() {
    let backend = ScriptedBackend::new(Duration::from_millis(100)).answer(
        "long",
        vec![content_line("part"), content_line("rest"), DONE.into()],
    );
    let h = harness(&config(0), backend, FakeController::default());

    let ticket = h.hearth.start_generation("long".into()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        h.hearth.generation_status(&ticket.id),
        Some(GenerationStatus::Streaming)
    );
    h.hearth.cancel_generation(&ticket.id);
    let outcome = ticket.handle.await.unwrap();
    settle().await;

    assert_eq!(outcome.status, GenerationStatus::Cancelled);
    assert_eq!(outcome.content, "part");
    assert_eq!(h.sink.texts_for(&ticket.id), vec!["part"]);
    assert!(h.store.turns().is_empty());
}

#[tokio::test]
async fn backend_failure_surfaces_as_text_then_complete() {
    // No script for this message: the backend refuses the request.
    let h = harness(&config(0), ScriptedBackend::default(), FakeController::default());

    let ticket = h.hearth.start_generation("unknown".into()).await;
    let outcome = ticket.handle.await.unwrap();
    settle().await;

    assert_eq!(outcome.status, GenerationStatus::Failed);
    let texts = h.sink.texts_for(&ticket.id);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Error"));
    assert!(matches!(
        h.sink.notifications().last(),
        Some(Notification::Complete { status: GenerationStatus::Failed, .. })
    ));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconfiguration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn reconfiguration_waits_for_the_active_generation() {
    let backend = ScriptedBackend::new(Duration::from_millis(200))
        .answer("q", vec![content_line("a"), content_line("b"), DONE.into()]);
    let h = harness(&config(1_000), backend, FakeController::default());

    let ticket = h.hearth.start_generation("q".into()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let out = h
        .hearth
        .set_reconfiguration(ReconfigRequest::new(true, AugmentMode::Augment))
        .await;
    assert_eq!(out, ReconfigOutcome::Scheduled);
    let out = h
        .hearth
        .set_reconfiguration(ReconfigRequest::new(true, AugmentMode::Strict))
        .await;
    assert_eq!(out, ReconfigOutcome::Scheduled);
    assert_eq!(h.hearth.coordinator().state(), CoordinatorState::Deferred);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(h.controller.restarts.lock().is_empty());

    ticket.handle.await.unwrap();
    settle().await;

    // Exactly one restart, with the last parameters, after Complete.
    let restarts = h.controller.restarts.lock().clone();
    assert_eq!(restarts, vec![ReconfigRequest::new(true, AugmentMode::Strict)]);
    let complete = h
        .sink
        .position(|n| matches!(n, Notification::Complete { .. }))
        .unwrap();
    let reconfigured = h
        .sink
        .position(|n| matches!(n, Notification::BackendReconfigured { .. }))
        .unwrap();
    assert!(complete < reconfigured);
    assert_eq!(h.hearth.coordinator().state(), CoordinatorState::Idle);
    assert_eq!(h.hearth.coordinator().settings().mode, AugmentMode::Strict);
}

#[tokio::test(start_paused = true)]
async fn requests_inside_the_debounce_window_collapse() {
    let h = harness(&config(1_000), ScriptedBackend::default(), FakeController::default());

    h.hearth
        .set_reconfiguration(ReconfigRequest::new(true, AugmentMode::Augment))
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.hearth
        .set_reconfiguration(ReconfigRequest::new(false, AugmentMode::Hybrid))
        .await;

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(h.controller.restarts.lock().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        h.controller.restarts.lock().clone(),
        vec![ReconfigRequest::new(false, AugmentMode::Hybrid)]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_never_overlap_restarts() {
    let h = harness(
        &config(0),
        ScriptedBackend::default(),
        FakeController::with_delay(Duration::from_millis(500)),
    );

    let mut tasks = Vec::new();
    for i in 0..5 {
        let hearth = h.hearth.clone();
        tasks.push(tokio::spawn(async move {
            hearth
                .coordinator()
                .apply_now(ReconfigRequest::new(i % 2 == 0, AugmentMode::Augment))
                .await
        }));
    }
    let mut outcomes = Vec::new();
    for t in tasks {
        outcomes.push(t.await.unwrap());
    }

    let applied = outcomes.iter().filter(|o| **o == ReconfigOutcome::Applied).count();
    let busy = outcomes.iter().filter(|o| **o == ReconfigOutcome::Busy).count();
    assert_eq!(applied, 1);
    assert_eq!(busy, 4);
    assert!(!*h.controller.overlapped.lock());
}

#[tokio::test]
async fn idle_request_without_debounce_applies_immediately() {
    let h = harness(&config(0), ScriptedBackend::default(), FakeController::default());

    let out = h
        .hearth
        .set_reconfiguration(ReconfigRequest::new(true, AugmentMode::Hybrid).with_model("qwq"))
        .await;
    assert_eq!(out, ReconfigOutcome::Applied);

    let settings = h.hearth.coordinator().settings();
    assert!(settings.augmentation_enabled);
    assert_eq!(settings.model, "qwq");
}

#[tokio::test]
async fn reconfigured_model_is_used_by_the_next_generation() {
    let backend = ScriptedBackend::default().answer("hi", vec![content_line("hey"), DONE.into()]);
    let h = harness(&config(0), backend, FakeController::default());

    h.hearth
        .set_reconfiguration(ReconfigRequest::new(false, AugmentMode::Augment).with_model("qwq"))
        .await;
    h.hearth.start_generation("hi".into()).await.handle.await.unwrap();

    let requests = h.backend.requests.lock();
    assert_eq!(requests[0].model, "qwq");
    assert!(requests[0].messages[0].content.contains("qwq"));
}
