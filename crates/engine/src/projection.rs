// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot projection and throttle.
//!
//! Snapshots are internally consistent (built under the state lock) and
//! immutable once published. The publisher coalesces dirty marks into at
//! most one publication per throttle window; the watch channel keeps only
//! the latest, so slow consumers never apply back-pressure.

use crate::engine::Engine;
use crate::state::FleetState;
use ocsm_adapters::{AgentApi, NotifyAdapter};
use ocsm_core::{
    Clock, ConnState, EffectiveStatus, InstanceId, MonitorConfig, Permission, RawStatus,
    ServerUrl, SessionId,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One server in a snapshot.
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    pub url: ServerUrl,
    pub instance_id: InstanceId,
    pub project: String,
    pub directory: String,
    pub branch: String,
    pub conn_state: ConnState,
    pub reconnect_attempt: u32,
    /// `project:branch`.
    pub label: String,
}

/// One session in a snapshot, with derived presentation fields.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub server_url: ServerUrl,
    pub parent_id: Option<SessionId>,
    pub title: Option<String>,
    pub raw_status: RawStatus,
    pub effective: EffectiveStatus,
    pub directory: Option<String>,
    /// How long the session has been busy, when it is.
    pub busy_for: Option<Duration>,
    /// Busy past the configured long-running horizon.
    pub long_running: bool,
    pub cost: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub tokens_total: u64,
    pub model: Option<String>,
    pub pending_permission: Option<Permission>,
    pub created_at_ms: u64,
}

/// Immutable view of the whole fleet at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub servers: Vec<ServerSnapshot>,
    pub sessions: Vec<SessionSnapshot>,
    pub taken_at_ms: u64,
}

impl Snapshot {
    pub fn server(&self, url: &ServerUrl) -> Option<&ServerSnapshot> {
        self.servers.iter().find(|s| &s.url == url)
    }

    pub fn session(&self, id: &SessionId) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn sessions_of<'a>(&'a self, url: &'a ServerUrl) -> impl Iterator<Item = &'a SessionSnapshot> {
        self.sessions.iter().filter(move |s| &s.server_url == url)
    }
}

/// Build a snapshot from the current state. Effective statuses are derived
/// here, on every build, from heartbeat age.
pub(crate) fn build_snapshot(
    state: &FleetState,
    now: Instant,
    at_ms: u64,
    config: &MonitorConfig,
) -> Snapshot {
    let mut servers: Vec<ServerSnapshot> = state
        .servers
        .values()
        .map(|s| ServerSnapshot {
            url: s.url.clone(),
            instance_id: s.instance_id.clone(),
            project: s.project.clone(),
            directory: s.directory.clone(),
            branch: s.branch.clone(),
            conn_state: s.conn_state,
            reconnect_attempt: s.reconnect_attempt,
            label: s.label(),
        })
        .collect();
    servers.sort_by(|a, b| a.url.cmp(&b.url));

    let mut sessions: Vec<SessionSnapshot> = state
        .sessions
        .values()
        .map(|session| {
            let age = state
                .servers
                .get(&session.owning_server_url)
                .map(|s| s.heartbeat_age(now))
                .unwrap_or(Duration::MAX);
            let effective = EffectiveStatus::derive(session.raw_status, age, config.instance_ttl);
            let busy_for = session.busy_since.map(|since| now.saturating_duration_since(since));
            SessionSnapshot {
                id: session.id.clone(),
                server_url: session.owning_server_url.clone(),
                parent_id: session.parent_id.clone(),
                title: session.title.clone(),
                raw_status: session.raw_status,
                effective,
                directory: session.directory.clone(),
                busy_for,
                long_running: busy_for.map(|d| d > config.long_running).unwrap_or(false),
                cost: session.cost,
                tokens_in: session.tokens_in,
                tokens_out: session.tokens_out,
                tokens_total: session.tokens_total,
                model: session.model.clone(),
                pending_permission: session.pending_permission.clone(),
                created_at_ms: session.created_at_ms,
            }
        })
        .collect();
    sessions.sort_by(|a, b| {
        a.server_url
            .cmp(&b.server_url)
            .then(a.created_at_ms.cmp(&b.created_at_ms))
            .then(a.id.cmp(&b.id))
    });

    Snapshot { servers, sessions, taken_at_ms: at_ms }
}

/// Publisher task: coalesce dirty marks, publish at most once per
/// throttle window.
pub(crate) async fn run_publisher<A, N, C>(engine: Arc<Engine<A, N, C>>)
where
    A: AgentApi,
    N: NotifyAdapter,
    C: Clock,
{
    loop {
        tokio::select! {
            _ = engine.shutdown.cancelled() => return,
            _ = engine.dirty.notified() => {}
        }
        tokio::select! {
            _ = engine.shutdown.cancelled() => return,
            _ = tokio::time::sleep(engine.config.snapshot_throttle) => {}
        }
        engine.publish();
    }
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;
