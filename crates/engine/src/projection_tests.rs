// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::FleetState;
use ocsm_core::{
    EffectiveStatus, InstanceId, MonitorConfig, RawStatus, Server, ServerUrl, SessionBuilder,
};
use std::time::{Duration, Instant};

fn url(s: &str) -> ServerUrl {
    ServerUrl::normalize(s).unwrap()
}

fn populated_state(now: Instant) -> (FleetState, ServerUrl) {
    let mut state = FleetState::new();
    let u = url("http://h1:1");
    state.insert_server(Server::announced(
        u.clone(),
        InstanceId::new("i1"),
        "proj",
        "/d",
        "main",
        now,
    ));
    (state, u)
}

#[test]
fn snapshot_orders_servers_and_sessions() {
    let now = Instant::now();
    let mut state = FleetState::new();
    for (u, i) in [("http://zeta:1", "i2"), ("http://alpha:1", "i1")] {
        state.insert_server(Server::announced(
            url(u),
            InstanceId::new(i),
            "p",
            "/d",
            "b",
            now,
        ));
    }
    let u = url("http://alpha:1");
    state.sessions.insert(
        "late".into(),
        SessionBuilder::new("late", &u).created_at_ms(200).build(),
    );
    state.sessions.insert(
        "early".into(),
        SessionBuilder::new("early", &u).created_at_ms(100).build(),
    );

    let snapshot = build_snapshot(&state, now, 1000, &MonitorConfig::default());
    assert_eq!(snapshot.servers[0].url, "http://alpha:1");
    assert_eq!(snapshot.servers[1].url, "http://zeta:1");
    assert_eq!(snapshot.sessions[0].id, "early");
    assert_eq!(snapshot.sessions[1].id, "late");
    assert_eq!(snapshot.taken_at_ms, 1000);
}

#[test]
fn effective_status_is_derived_from_heartbeat_age() {
    let now = Instant::now();
    let (mut state, u) = populated_state(now);
    state.sessions.insert(
        "s1".into(),
        SessionBuilder::new("s1", &u).status(RawStatus::Running).build(),
    );
    let config = MonitorConfig::default();

    let fresh = build_snapshot(&state, now, 0, &config);
    assert_eq!(fresh.sessions[0].effective, EffectiveStatus::Busy);

    let later = now + config.instance_ttl + Duration::from_secs(1);
    let stale = build_snapshot(&state, later, 0, &config);
    assert_eq!(stale.sessions[0].effective, EffectiveStatus::Stale);
}

#[test]
fn busy_duration_and_long_running_flag() {
    let now = Instant::now();
    let (mut state, u) = populated_state(now);
    let config = MonitorConfig::default();
    state.sessions.insert(
        "s1".into(),
        SessionBuilder::new("s1", &u)
            .status(RawStatus::Busy)
            .busy_since(now)
            .build(),
    );

    let soon = now + Duration::from_secs(30);
    // Keep the heartbeat fresh so the session reads busy, not stale.
    state.touch_announce(&u, "proj", "/d", "main", soon);
    let snapshot = build_snapshot(&state, soon, 0, &config);
    assert_eq!(snapshot.sessions[0].busy_for, Some(Duration::from_secs(30)));
    assert!(!snapshot.sessions[0].long_running);

    let much_later = now + config.long_running + Duration::from_secs(1);
    state.touch_announce(&u, "proj", "/d", "main", much_later);
    let snapshot = build_snapshot(&state, much_later, 0, &config);
    assert!(snapshot.sessions[0].long_running);
}

#[test]
fn snapshot_lookup_helpers() {
    let now = Instant::now();
    let (mut state, u) = populated_state(now);
    state.sessions.insert("s1".into(), SessionBuilder::new("s1", &u).build());

    let snapshot = build_snapshot(&state, now, 0, &MonitorConfig::default());
    assert!(snapshot.server(&u).is_some());
    assert!(snapshot.session(&"s1".into()).is_some());
    assert_eq!(snapshot.sessions_of(&u).count(), 1);
    assert!(snapshot.server(&url("http://nope:9")).is_none());
}

#[test]
fn sessions_of_a_missing_server_read_stale() {
    // A session whose server vanished (mid-teardown artifact) must never
    // read as busy.
    let now = Instant::now();
    let mut state = FleetState::new();
    let u = url("http://gone:1");
    state.sessions.insert(
        "s1".into(),
        SessionBuilder::new("s1", &u).status(RawStatus::Running).build(),
    );
    let snapshot = build_snapshot(&state, now, 0, &MonitorConfig::default());
    assert_eq!(snapshot.sessions[0].effective, EffectiveStatus::Stale);
}
