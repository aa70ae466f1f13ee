// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE event application.
//!
//! Events from one server arrive in order through its connection task and
//! are applied here. Sessions that show up in an event before any fetch
//! are materialized with a follow-up details request.

use crate::engine::Engine;
use crate::state::FetchedSession;
use ocsm_adapters::{AgentApi, NotifyAdapter};
use ocsm_core::{Clock, RawStatus, ServerUrl, SessionId, UpstreamEvent};

impl<A: AgentApi, N: NotifyAdapter, C: Clock> Engine<A, N, C> {
    /// Apply one upstream event from a server's stream.
    pub(crate) async fn ingest(&self, url: &ServerUrl, event: UpstreamEvent) {
        let now = self.clock.now();
        let at_ms = self.clock.epoch_ms();
        let horizon = self.config.instance_ttl;

        match event {
            UpstreamEvent::ServerConnected => {
                tracing::debug!(server = %url, "upstream reports connected");
            }
            UpstreamEvent::SessionStatus { session_id, status } => {
                let outcome = {
                    self.state.lock().apply_status(url, &session_id, status, now, at_ms, horizon)
                };
                self.mark_dirty();
                if let Some(transition) = outcome.transition {
                    self.send_transitions(vec![transition]).await;
                }
                if outcome.is_new && status != RawStatus::Idle {
                    self.materialize(url, &session_id).await;
                }
            }
            UpstreamEvent::SessionIdle { session_id } => {
                let outcome = {
                    self.state.lock().apply_status(
                        url,
                        &session_id,
                        RawStatus::Idle,
                        now,
                        at_ms,
                        horizon,
                    )
                };
                self.mark_dirty();
                if let Some(transition) = outcome.transition {
                    self.send_transitions(vec![transition]).await;
                }
            }
            UpstreamEvent::SessionUpdated { session_id, title, parent_id, directory } => {
                let is_new = {
                    self.state.lock().apply_update(
                        url,
                        &session_id,
                        title,
                        parent_id,
                        directory,
                        now,
                    )
                };
                self.mark_dirty();
                if is_new {
                    self.materialize(url, &session_id).await;
                }
            }
            UpstreamEvent::SessionDeleted { session_id } => {
                let removed = { self.state.lock().delete_session(&session_id) };
                if removed {
                    self.mark_dirty();
                }
            }
            UpstreamEvent::PermissionUpdated { permission } => {
                let session_id = permission.session_id.clone();
                let (is_new, transition) =
                    { self.state.lock().set_permission(url, permission, now, at_ms) };
                self.mark_dirty();
                if let Some(transition) = transition {
                    self.send_transitions(vec![transition]).await;
                }
                if is_new {
                    self.materialize(url, &session_id).await;
                }
            }
            UpstreamEvent::PermissionReplied { session_id, .. } => {
                let cleared = { self.state.lock().clear_permission(&session_id) };
                if cleared {
                    self.mark_dirty();
                }
            }
            // The session view driver holds its own filtered subscription
            // for message refreshes; nothing to apply here.
            UpstreamEvent::MessageUpdated { .. } | UpstreamEvent::MessagePartUpdated { .. } => {}
            UpstreamEvent::Other { event_type } => {
                tracing::debug!(server = %url, event_type, "ignoring unknown event type");
            }
        }
    }

    /// Fetch details and stats for a session first seen in an event.
    /// Best-effort; the event-carried fields already exist in the store.
    async fn materialize(&self, url: &ServerUrl, id: &SessionId) {
        let info = match self.api.session(url, id).await {
            Ok(info) => info,
            Err(e) => {
                tracing::debug!(session = %id, error = %e, "materialize fetch failed");
                return;
            }
        };
        let stats = self.api.stats(url, id).await.unwrap_or_default();
        // Keep the raw status the event established; the details fetch
        // only fills in metadata.
        let raw = {
            self.state
                .lock()
                .session(id)
                .map(|s| s.raw_status)
                .or_else(|| info.raw_status())
                .unwrap_or(RawStatus::Idle)
        };
        let transitions = {
            self.state.lock().merge_fetched(
                url,
                FetchedSession { info, raw, stats },
                self.clock.now(),
                self.clock.epoch_ms(),
                self.config.instance_ttl,
            )
        };
        self.mark_dirty();
        self.send_transitions(transitions).await;
    }
}
