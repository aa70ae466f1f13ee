// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::SessionId;
use crate::status::RawStatus;
use crate::url::ServerUrl;
use std::time::{Duration, Instant};

fn url() -> ServerUrl {
    ServerUrl::normalize("http://127.0.0.1:4096").unwrap()
}

#[test]
fn discovered_active_session_gets_busy_since() {
    let now = Instant::now();
    let s = Session::discovered(SessionId::new("s1"), url(), RawStatus::Running, now);
    assert_eq!(s.busy_since, Some(now));
}

#[test]
fn discovered_idle_session_has_no_busy_since() {
    let s = Session::discovered(SessionId::new("s1"), url(), RawStatus::Idle, Instant::now());
    assert_eq!(s.busy_since, None);
}

#[test]
fn entering_active_sets_busy_since_once() {
    let t0 = Instant::now();
    let s = Session::discovered(SessionId::new("s1"), url(), RawStatus::Idle, t0);

    let t1 = t0 + Duration::from_secs(1);
    let busy = s.with_status(RawStatus::Running, t1);
    assert_eq!(busy.busy_since, Some(t1));

    // Staying active must not move the marker.
    let t2 = t1 + Duration::from_secs(5);
    let still_busy = busy.with_status(RawStatus::Busy, t2);
    assert_eq!(still_busy.busy_since, Some(t1));
}

#[test]
fn leaving_active_clears_busy_since() {
    let t0 = Instant::now();
    let s = Session::discovered(SessionId::new("s1"), url(), RawStatus::Running, t0);
    let idle = s.with_status(RawStatus::Idle, t0 + Duration::from_secs(2));
    assert_eq!(idle.busy_since, None);
}

#[test]
fn update_merges_only_present_fields() {
    let s = SessionBuilder::new("s1", &url()).title("old").directory("/a").build();
    let merged = s.with_update(None, Some(SessionId::new("p1")), None);
    assert_eq!(merged.title.as_deref(), Some("old"));
    assert_eq!(merged.parent_id, Some(SessionId::new("p1")));
    assert_eq!(merged.directory.as_deref(), Some("/a"));
}

#[test]
fn status_change_produces_a_new_record() {
    let s = Session::discovered(SessionId::new("s1"), url(), RawStatus::Idle, Instant::now());
    let s2 = s.with_status(RawStatus::Running, Instant::now());
    assert_eq!(s.raw_status, RawStatus::Idle);
    assert_eq!(s2.raw_status, RawStatus::Running);
}

#[test]
fn stats_keep_previous_model_when_absent() {
    let now = Instant::now();
    let s = SessionBuilder::new("s1", &url()).build();
    let with_model = s.with_stats(0.5, 10, 20, 30, Some("m1".into()), now);
    let refreshed = with_model.with_stats(0.7, 11, 21, 32, None, now);
    assert_eq!(refreshed.model.as_deref(), Some("m1"));
    assert_eq!(refreshed.cost, 0.7);
    assert_eq!(refreshed.stats_updated_at, Some(now));
}
