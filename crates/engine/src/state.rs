// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authoritative in-memory fleet state: the server registry and the
//! session store.
//!
//! Every mutator runs inside the engine's single mutex and returns the
//! transitions it produced; callers publish those after the lock drops.
//! Mutators replace whole session records rather than patching in place.

use ocsm_core::{
    ConnState, EffectiveStatus, InstanceId, Permission, RawStatus, Server, ServerUrl, Session,
    SessionId, SessionInfo, SessionStats, StatusField, Transition, TransitionKind,
};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Result of applying a status to one session.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    /// The session was not previously known.
    pub is_new: bool,
    /// Effective-status change produced by the mutation, if any.
    pub transition: Option<Transition>,
}

/// One session's worth of initial-fetch results, ready to commit.
#[derive(Debug)]
pub struct FetchedSession {
    pub info: SessionInfo,
    pub raw: RawStatus,
    pub stats: Option<SessionStats>,
}

/// Both maps, guarded together by the engine.
#[derive(Default)]
pub struct FleetState {
    pub servers: HashMap<ServerUrl, Server>,
    pub sessions: HashMap<SessionId, Session>,
}

impl FleetState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- registry ---

    pub fn server(&self, url: &ServerUrl) -> Option<&Server> {
        self.servers.get(url)
    }

    pub fn server_url_by_instance(&self, instance_id: &InstanceId) -> Option<ServerUrl> {
        self.servers
            .values()
            .find(|s| &s.instance_id == instance_id)
            .map(|s| s.url.clone())
    }

    pub fn insert_server(&mut self, server: Server) {
        self.servers.insert(server.url.clone(), server);
    }

    /// Refresh announce-carried fields on an existing server.
    /// Last-write-wins on the scalar fields.
    pub fn touch_announce(
        &mut self,
        url: &ServerUrl,
        project: &str,
        directory: &str,
        branch: &str,
        now: Instant,
    ) {
        if let Some(server) = self.servers.get_mut(url) {
            server.last_announce_at = now;
            server.project = project.to_string();
            server.directory = directory.to_string();
            server.branch = branch.to_string();
        }
    }

    /// Remove a server and all of its sessions in one critical section.
    /// Idempotent; returns whether the server existed.
    pub fn remove_server(&mut self, url: &ServerUrl) -> bool {
        let existed = self.servers.remove(url).is_some();
        self.sessions.retain(|_, s| &s.owning_server_url != url);
        existed
    }

    pub fn stale_servers(&self, now: Instant, horizon: Duration) -> Vec<ServerUrl> {
        self.servers
            .values()
            .filter(|s| s.is_stale(now, horizon))
            .map(|s| s.url.clone())
            .collect()
    }

    pub fn set_connecting(&mut self, url: &ServerUrl) {
        if let Some(server) = self.servers.get_mut(url) {
            server.conn_state = ConnState::Connecting;
        }
    }

    pub fn set_connected(&mut self, url: &ServerUrl) {
        if let Some(server) = self.servers.get_mut(url) {
            server.conn_state = ConnState::Connected;
            server.reconnect_attempt = 0;
            server.disconnected_at = None;
        }
    }

    pub fn set_disconnected(&mut self, url: &ServerUrl, attempt: u32, now: Instant) {
        if let Some(server) = self.servers.get_mut(url) {
            server.conn_state = ConnState::Disconnected;
            server.reconnect_attempt = attempt;
            server.disconnected_at = Some(now);
        }
    }

    // --- session store ---

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    fn server_label(&self, url: &ServerUrl) -> String {
        self.servers.get(url).map(|s| s.label()).unwrap_or_default()
    }

    fn effective_of(&self, session: &Session, now: Instant, horizon: Duration) -> EffectiveStatus {
        let age = self
            .servers
            .get(&session.owning_server_url)
            .map(|s| s.heartbeat_age(now))
            .unwrap_or(Duration::MAX);
        EffectiveStatus::derive(session.raw_status, age, horizon)
    }

    /// Apply a raw status to a session, creating it if unknown.
    pub fn apply_status(
        &mut self,
        url: &ServerUrl,
        id: &SessionId,
        raw: RawStatus,
        now: Instant,
        at_ms: u64,
        horizon: Duration,
    ) -> ApplyOutcome {
        match self.sessions.get(id) {
            Some(existing) => {
                let old_eff = self.effective_of(existing, now, horizon);
                let replaced = existing.with_status(raw, now);
                let new_eff = self.effective_of(&replaced, now, horizon);
                let title_hint = replaced.title.clone();
                let server_label = self.server_label(&replaced.owning_server_url);
                self.sessions.insert(id.clone(), replaced);
                let transition = (old_eff != new_eff).then(|| Transition {
                    session_id: id.clone(),
                    kind: TransitionKind::Status { old: old_eff, new: new_eff },
                    title_hint,
                    server_label,
                    at_ms,
                });
                ApplyOutcome { is_new: false, transition }
            }
            None => {
                let session = Session::discovered(id.clone(), url.clone(), raw, now);
                self.sessions.insert(id.clone(), session);
                // A session seen for the first time has no previous state,
                // so no transition is emitted.
                ApplyOutcome { is_new: true, transition: None }
            }
        }
    }

    /// Merge `session.updated` fields. Returns whether the session was new.
    /// A parent link that would create a cycle is dropped and the node
    /// stays a root.
    pub fn apply_update(
        &mut self,
        url: &ServerUrl,
        id: &SessionId,
        title: Option<String>,
        parent_id: Option<SessionId>,
        directory: Option<String>,
        now: Instant,
    ) -> bool {
        let parent_id = parent_id.filter(|parent| {
            if self.would_cycle(id, parent) {
                tracing::warn!(session = %id, parent = %parent, "dropping cyclic parent link");
                false
            } else {
                true
            }
        });
        match self.sessions.get(id) {
            Some(existing) => {
                let replaced = existing.with_update(title, parent_id, directory);
                self.sessions.insert(id.clone(), replaced);
                false
            }
            None => {
                let session = Session::discovered(id.clone(), url.clone(), RawStatus::Idle, now)
                    .with_update(title, parent_id, directory);
                self.sessions.insert(id.clone(), session);
                true
            }
        }
    }

    /// Would linking `child` under `parent` close a cycle?
    fn would_cycle(&self, child: &SessionId, parent: &SessionId) -> bool {
        if child == parent {
            return true;
        }
        let mut cursor = Some(parent.clone());
        let mut hops = 0;
        while let Some(id) = cursor {
            if &id == child {
                return true;
            }
            hops += 1;
            if hops > self.sessions.len() {
                return true;
            }
            cursor = self.sessions.get(&id).and_then(|s| s.parent_id.clone());
        }
        false
    }

    /// Delete a session and every descendant.
    pub fn delete_session(&mut self, id: &SessionId) -> bool {
        if !self.sessions.contains_key(id) {
            return false;
        }
        let mut doomed = vec![id.clone()];
        let mut index = 0;
        while index < doomed.len() {
            let parent = doomed[index].clone();
            for (child_id, child) in &self.sessions {
                if child.parent_id.as_ref() == Some(&parent) && !doomed.contains(child_id) {
                    doomed.push(child_id.clone());
                }
            }
            index += 1;
        }
        for id in &doomed {
            self.sessions.remove(id);
        }
        true
    }

    /// Set a pending permission. Emits a transition only when the request
    /// is new (a re-delivered identical permission does not re-notify).
    pub fn set_permission(
        &mut self,
        url: &ServerUrl,
        permission: Permission,
        now: Instant,
        at_ms: u64,
    ) -> (bool, Option<Transition>) {
        let id = permission.session_id.clone();
        let is_new_session = !self.sessions.contains_key(&id);
        if is_new_session {
            let session =
                Session::discovered(id.clone(), url.clone(), RawStatus::Idle, now);
            self.sessions.insert(id.clone(), session);
        }
        let Some(existing) = self.sessions.get(&id) else {
            return (is_new_session, None);
        };
        let already_pending =
            existing.pending_permission.as_ref().map(|p| &p.id) == Some(&permission.id);
        let title_hint = existing.title.clone();
        let server_label = self.server_label(&existing.owning_server_url);
        let tool = permission.tool.clone();
        let replaced = existing.with_permission(Some(permission));
        self.sessions.insert(id.clone(), replaced);
        let transition = (!already_pending).then(|| Transition {
            session_id: id,
            kind: TransitionKind::PermissionRequested { tool },
            title_hint,
            server_label,
            at_ms,
        });
        (is_new_session, transition)
    }

    pub fn clear_permission(&mut self, id: &SessionId) -> bool {
        match self.sessions.get(id) {
            Some(existing) if existing.pending_permission.is_some() => {
                let replaced = existing.with_permission(None);
                self.sessions.insert(id.clone(), replaced);
                true
            }
            _ => false,
        }
    }

    /// Merge one fetched session: status (with transition), updated
    /// fields, timestamps and stats. Does not prune anything.
    pub fn merge_fetched(
        &mut self,
        url: &ServerUrl,
        item: FetchedSession,
        now: Instant,
        at_ms: u64,
        horizon: Duration,
    ) -> Vec<Transition> {
        let id = SessionId::new(item.info.id.clone());
        let outcome = self.apply_status(url, &id, item.raw, now, at_ms, horizon);
        self.apply_update(
            url,
            &id,
            item.info.title.clone(),
            item.info.parent_id.clone().map(SessionId::new),
            item.info.directory.clone(),
            now,
        );
        if let Some(session) = self.sessions.get(&id) {
            let mut replaced = session.clone();
            replaced.created_at_ms = item.info.created_ms();
            replaced.updated_at_ms = item.info.updated_ms();
            if let Some(stats) = &item.stats {
                replaced = replaced.with_stats(
                    stats.cost.unwrap_or(replaced.cost),
                    stats.tokens.map(|t| t.input).unwrap_or(replaced.tokens_in),
                    stats.tokens.map(|t| t.output).unwrap_or(replaced.tokens_out),
                    stats.tokens.map(|t| t.combined()).unwrap_or(replaced.tokens_total),
                    stats.model.clone(),
                    now,
                );
            }
            self.sessions.insert(id, replaced);
        }
        outcome.transition.into_iter().collect()
    }

    /// Commit an initial fetch or periodic refresh: upsert every fetched
    /// session and drop this server's sessions that fell out of the
    /// relevant set.
    pub fn commit_fetch(
        &mut self,
        url: &ServerUrl,
        fetched: Vec<FetchedSession>,
        now: Instant,
        at_ms: u64,
        horizon: Duration,
    ) -> Vec<Transition> {
        let keep: HashSet<SessionId> =
            fetched.iter().map(|f| SessionId::new(f.info.id.clone())).collect();
        let mut transitions = Vec::new();
        for item in fetched {
            transitions.extend(self.merge_fetched(url, item, now, at_ms, horizon));
        }
        self.sessions
            .retain(|id, s| &s.owning_server_url != url || keep.contains(id));
        transitions
    }
}

/// Compute the relevant set for a freshly fetched server (§initial fetch):
/// every active session, its ancestors, the most-recently-updated root in
/// the server's announced directory, and, to a fixpoint, children of
/// included nodes that are active or recently updated.
pub fn relevant_set(
    list: &[SessionInfo],
    active: &HashMap<SessionId, StatusField>,
    server_directory: &str,
    now_ms: u64,
    recent_window: Duration,
) -> HashSet<SessionId> {
    let by_id: HashMap<&str, &SessionInfo> =
        list.iter().map(|info| (info.id.as_str(), info)).collect();
    let mut included: HashSet<SessionId> = active.keys().cloned().collect();

    // Ancestors of every active session.
    for id in active.keys() {
        let mut cursor = by_id.get(id.as_str()).and_then(|info| info.parent_id.clone());
        let mut hops = 0;
        while let Some(parent) = cursor {
            if hops > list.len() || !included.insert(SessionId::new(parent.clone())) {
                break;
            }
            hops += 1;
            cursor = by_id.get(parent.as_str()).and_then(|info| info.parent_id.clone());
        }
    }

    // The freshest root working in the server's announced directory.
    let wanted_dir = server_directory.trim_end_matches('/');
    let matching_root = list
        .iter()
        .filter(|info| info.parent_id.is_none())
        .filter(|info| {
            info.directory
                .as_deref()
                .map(|d| d.trim_end_matches('/') == wanted_dir)
                .unwrap_or(false)
        })
        .max_by_key(|info| info.updated_ms());
    if let Some(root) = matching_root {
        included.insert(SessionId::new(root.id.clone()));
    }

    // Children of included nodes, when active or recently updated.
    let recent_cutoff = now_ms.saturating_sub(recent_window.as_millis() as u64);
    loop {
        let mut grew = false;
        for info in list {
            let id = SessionId::new(info.id.clone());
            if included.contains(&id) {
                continue;
            }
            let Some(parent) = &info.parent_id else {
                continue;
            };
            if !included.contains(parent.as_str()) {
                continue;
            }
            let keep = active.contains_key(info.id.as_str())
                || info.updated_ms() >= recent_cutoff;
            if keep {
                included.insert(id);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    included
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
