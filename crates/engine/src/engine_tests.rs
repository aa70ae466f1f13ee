// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ocsm_adapters::{FakeAgentApi, FakeNotifyAdapter, RecordedCommand};
use ocsm_core::{
    ConnState, EffectiveStatus, FakeClock, InstanceId, MonitorConfig, PermissionReply,
    RawStatus, ServerUrl, SessionId, UpstreamEvent,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

type TestEngine = Arc<Engine<FakeAgentApi, FakeNotifyAdapter, FakeClock>>;

fn test_engine() -> (TestEngine, FakeAgentApi, FakeNotifyAdapter, FakeClock) {
    let api = FakeAgentApi::new();
    let notify = FakeNotifyAdapter::new();
    let clock = FakeClock::new();
    let engine = Engine::new(MonitorConfig::default(), api.clone(), notify.clone(), clock.clone());
    (engine, api, notify, clock)
}

fn url(s: &str) -> ServerUrl {
    ServerUrl::normalize(s).unwrap()
}

async fn announce(engine: &TestEngine, raw_url: &str, instance: &str) {
    engine
        .handle_announce(raw_url, InstanceId::new(instance), "p", "/d", "main")
        .await;
}

/// Let spawned tasks run without advancing time.
async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

fn session_info(value: serde_json::Value) -> ocsm_core::SessionInfo {
    serde_json::from_value(value).unwrap()
}

// --- scenario: announce -> connect -> idle ---

#[tokio::test(start_paused = true)]
async fn announce_connects_with_zero_sessions() {
    let (engine, api, _notify, _clock) = test_engine();
    announce(&engine, "http://localhost:4096/", "i1").await;
    settle().await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.servers.len(), 1);
    let server = &snapshot.servers[0];
    assert_eq!(server.url, "http://127.0.0.1:4096");
    assert_eq!(server.conn_state, ConnState::Connected);
    assert_eq!(server.reconnect_attempt, 0);
    assert!(snapshot.sessions.is_empty());
    assert_eq!(api.subscribe_count(&url("http://127.0.0.1:4096")), 1);
}

#[tokio::test(start_paused = true)]
async fn duplicate_announce_updates_without_reconnect() {
    let (engine, api, _notify, _clock) = test_engine();
    announce(&engine, "http://localhost:4096/", "i1").await;
    settle().await;
    announce(&engine, "http://localhost:4096/", "i1").await;
    settle().await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.servers.len(), 1);
    assert_eq!(api.subscribe_count(&url("http://127.0.0.1:4096")), 1);
}

// --- scenario: instance restart ---

#[tokio::test(start_paused = true)]
async fn instance_change_restarts_the_server() {
    let (engine, api, _notify, _clock) = test_engine();
    let u = url("http://127.0.0.1:4096");
    api.set_sessions(&u, vec![session_info(json!({"id": "s1"}))]);
    api.set_status(&u, "s1", "running");
    announce(&engine, "http://localhost:4096/", "i1").await;
    settle().await;
    assert!(engine.snapshot().session(&SessionId::new("s1")).is_some());

    // Same URL, new instance id: old sessions must be gone.
    api.set_sessions(&u, vec![]);
    api.clear_status(&u, "s1");
    announce(&engine, "http://localhost:4096/", "i2").await;
    settle().await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.servers.len(), 1);
    let server = &snapshot.servers[0];
    assert_eq!(server.instance_id, InstanceId::new("i2"));
    assert_eq!(server.conn_state, ConnState::Connected);
    assert_eq!(server.reconnect_attempt, 0);
    assert!(snapshot.sessions.is_empty());
    assert_eq!(api.subscribe_count(&u), 2);
}

// --- shutdown packets ---

#[tokio::test(start_paused = true)]
async fn shutdown_removes_the_owning_server() {
    let (engine, _api, _notify, _clock) = test_engine();
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;

    engine.handle_shutdown(&InstanceId::new("i1")).await;
    assert!(engine.snapshot().servers.is_empty());

    // Unknown instance id is a no-op.
    engine.handle_shutdown(&InstanceId::new("ghost")).await;
    assert!(engine.snapshot().servers.is_empty());
}

// --- scenario: busy -> idle notification ---

#[tokio::test(start_paused = true)]
async fn busy_to_idle_emits_one_notification() {
    let (engine, api, notify, _clock) = test_engine();
    engine.start_background_tasks();
    let u = url("http://127.0.0.1:4096");
    api.set_sessions(
        &u,
        vec![session_info(json!({"id": "s1", "title": "refactor parser"}))],
    );
    api.set_status(&u, "s1", "running");
    announce(&engine, "http://localhost:4096/", "i1").await;
    settle().await;

    let before = engine.snapshot();
    assert_eq!(before.session(&SessionId::new("s1")).unwrap().effective, EffectiveStatus::Busy);

    api.push_event(&u, UpstreamEvent::SessionIdle { session_id: SessionId::new("s1") }).await;
    settle().await;

    let after = engine.snapshot();
    let session = after.session(&SessionId::new("s1")).unwrap();
    assert_eq!(session.raw_status, RawStatus::Idle);
    assert!(session.busy_for.is_none());

    let calls = notify.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].title, "OpenCode");
    assert_eq!(calls[0].subtitle, "p:main");
    assert_eq!(calls[0].body, "refactor parser");
}

#[tokio::test(start_paused = true)]
async fn notifications_can_be_disabled() {
    let api = FakeAgentApi::new();
    let notify = FakeNotifyAdapter::new();
    let clock = FakeClock::new();
    let config = MonitorConfig { notifications_enabled: false, ..MonitorConfig::default() };
    let engine = Engine::new(config, api.clone(), notify.clone(), clock);
    engine.start_background_tasks();

    let u = url("http://h1:1");
    api.set_sessions(&u, vec![session_info(json!({"id": "s1"}))]);
    api.set_status(&u, "s1", "busy");
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;
    api.push_event(&u, UpstreamEvent::SessionIdle { session_id: SessionId::new("s1") }).await;
    settle().await;

    assert!(notify.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cold_start_idle_does_not_notify() {
    let (engine, api, notify, _clock) = test_engine();
    engine.start_background_tasks();
    let u = url("http://h1:1");
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;

    // First sighting arrives already idle: no transition, no noise.
    api.push_event(&u, UpstreamEvent::SessionIdle { session_id: SessionId::new("sx") }).await;
    settle().await;
    assert!(notify.calls().is_empty());
}

// --- scenario: permission flow ---

#[tokio::test(start_paused = true)]
async fn permission_request_notifies_and_reply_round_trips() {
    let (engine, api, notify, _clock) = test_engine();
    engine.start_background_tasks();
    let u = url("http://127.0.0.1:4096");
    api.set_sessions(&u, vec![session_info(json!({"id": "s1", "title": "t"}))]);
    api.set_status(&u, "s1", "running");
    announce(&engine, "http://localhost:4096", "i1").await;
    settle().await;

    let event = UpstreamEvent::parse(
        r#"{"type":"permission.updated","properties":{
            "sessionID":"s1","permissionID":"p1","tool":"bash","args":{"cmd":"ls"}}}"#,
    )
    .unwrap();
    api.push_event(&u, event).await;
    settle().await;

    let snapshot = engine.snapshot();
    let pending = snapshot.session(&SessionId::new("s1")).unwrap().pending_permission.clone();
    let pending = pending.unwrap();
    assert_eq!(pending.id, "p1");
    assert_eq!(pending.tool, "bash");
    assert_eq!(pending.args.get("cmd"), Some(&json!("ls")));
    assert_eq!(notify.calls().len(), 1);

    let view = engine.open_view(&SessionId::new("s1")).await.unwrap();
    view.respond_permission(&pending.id, PermissionReply::Allow, false).await;
    settle().await;

    assert!(api.commands().iter().any(|c| matches!(
        c,
        RecordedCommand::PermissionResponse { session, permission, response, remember, .. }
            if session == &SessionId::new("s1")
                && permission == &ocsm_core::PermissionId::new("p1")
                && *response == PermissionReply::Allow
                && !*remember
    )));
    assert!(engine
        .snapshot()
        .session(&SessionId::new("s1"))
        .unwrap()
        .pending_permission
        .is_none());
}

// --- scenario: reconnect backoff ---

#[tokio::test(start_paused = true)]
async fn reconnect_backoff_doubles_until_success() {
    let (engine, api, _notify, _clock) = test_engine();
    let u = url("http://h1:1");
    api.fail_subscribes(&u, 4);
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;

    // First attempt failed immediately.
    assert_eq!(api.subscribe_count(&u), 1);
    assert_eq!(engine.snapshot().servers[0].conn_state, ConnState::Disconnected);
    assert_eq!(engine.snapshot().servers[0].reconnect_attempt, 1);

    // 1s, 2s, 4s, 8s.
    advance(Duration::from_millis(900)).await;
    assert_eq!(api.subscribe_count(&u), 1, "retry must wait the full base delay");
    advance(Duration::from_millis(100)).await;
    assert_eq!(api.subscribe_count(&u), 2);

    advance(Duration::from_secs(2)).await;
    assert_eq!(api.subscribe_count(&u), 3);

    advance(Duration::from_secs(4)).await;
    assert_eq!(api.subscribe_count(&u), 4);

    advance(Duration::from_secs(8)).await;
    assert_eq!(api.subscribe_count(&u), 5);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.servers[0].conn_state, ConnState::Connected);
    assert_eq!(snapshot.servers[0].reconnect_attempt, 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_stream_reconnects_from_base_delay() {
    let (engine, api, _notify, _clock) = test_engine();
    let u = url("http://h1:1");
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;
    assert_eq!(engine.snapshot().servers[0].conn_state, ConnState::Connected);

    api.break_streams(&u);
    settle().await;
    assert_eq!(engine.snapshot().servers[0].conn_state, ConnState::Disconnected);

    advance(Duration::from_secs(1)).await;
    assert_eq!(api.subscribe_count(&u), 2);
    assert_eq!(engine.snapshot().servers[0].conn_state, ConnState::Connected);
}

// --- staleness sweep ---

#[tokio::test(start_paused = true)]
async fn sweep_removes_servers_past_the_horizon() {
    let (engine, _api, _notify, clock) = test_engine();
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;

    clock.advance(Duration::from_secs(180));
    engine.sweep_stale().await;
    assert_eq!(engine.snapshot().servers.len(), 1, "exactly at the horizon is kept");

    clock.advance(Duration::from_secs(1));
    engine.sweep_stale().await;
    assert!(engine.snapshot().servers.is_empty());
}

// --- event-driven session discovery ---

#[tokio::test(start_paused = true)]
async fn active_status_event_materializes_unknown_session() {
    let (engine, api, _notify, _clock) = test_engine();
    let u = url("http://h1:1");
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;

    api.set_sessions(
        &u,
        vec![session_info(json!({"id": "s9", "title": "materialized"}))],
    );
    api.push_event(
        &u,
        UpstreamEvent::SessionStatus {
            session_id: SessionId::new("s9"),
            status: RawStatus::Running,
        },
    )
    .await;
    settle().await;

    let snapshot = engine.snapshot();
    let session = snapshot.session(&SessionId::new("s9")).unwrap();
    assert_eq!(session.title.as_deref(), Some("materialized"));
    assert_eq!(session.effective, EffectiveStatus::Busy);
}

#[tokio::test(start_paused = true)]
async fn session_deleted_event_removes_the_session() {
    let (engine, api, _notify, _clock) = test_engine();
    let u = url("http://h1:1");
    api.set_sessions(&u, vec![session_info(json!({"id": "s1"}))]);
    api.set_status(&u, "s1", "running");
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;

    api.push_event(&u, UpstreamEvent::SessionDeleted { session_id: SessionId::new("s1") })
        .await;
    settle().await;
    assert!(engine.snapshot().sessions.is_empty());
}

// --- discovery bookkeeping ---

#[tokio::test(start_paused = true)]
async fn bad_announce_urls_are_counted_as_dropped() {
    let (engine, _api, _notify, _clock) = test_engine();
    engine
        .handle_announce("definitely not a url", InstanceId::new("i1"), "", "", "")
        .await;
    assert_eq!(engine.discovery_counts().1, 1);
    assert!(engine.snapshot().servers.is_empty());
}

// --- snapshot publication ---

#[tokio::test(start_paused = true)]
async fn publisher_coalesces_into_throttled_snapshots() {
    let (engine, _api, _notify, _clock) = test_engine();
    engine.start_background_tasks();
    let mut rx = engine.subscribe();
    assert!(rx.borrow().servers.is_empty());

    announce(&engine, "http://h1:1", "i1").await;
    announce(&engine, "http://h2:1", "i2").await;
    settle().await;

    advance(Duration::from_millis(100)).await;
    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.servers.len(), 2);
}

// --- long-running flag ---

#[tokio::test(start_paused = true)]
async fn long_running_sessions_are_flagged() {
    let (engine, api, _notify, clock) = test_engine();
    let u = url("http://h1:1");
    api.set_sessions(&u, vec![session_info(json!({"id": "s1"}))]);
    api.set_status(&u, "s1", "busy");
    announce(&engine, "http://h1:1", "i1").await;
    settle().await;

    assert!(!engine.snapshot().session(&SessionId::new("s1")).unwrap().long_running);
    clock.advance(Duration::from_secs(11 * 60));
    // Keep the server's heartbeat fresh so the session stays busy, not stale.
    announce(&engine, "http://h1:1", "i1").await;
    let session = engine.snapshot().session(&SessionId::new("s1")).cloned().unwrap();
    assert_eq!(session.effective, EffectiveStatus::Busy);
    assert!(session.long_running);
}
