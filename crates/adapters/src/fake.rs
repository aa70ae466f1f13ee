// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapters for tests: scripted upstream responses, injectable event
//! streams, recorded commands and notifications.

use crate::api::{AgentApi, ApiError, EventSubscription};
use crate::notify::{Notification, NotifyAdapter, NotifyError};
use async_trait::async_trait;
use ocsm_core::{
    MessageEnvelope, PermissionId, PermissionReply, PermissionResponseBody, PromptBody,
    ServerUrl, SessionId, SessionInfo, SessionStats, StatusField, UpstreamEvent,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A command the fake observed.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Abort {
        server: ServerUrl,
        session: SessionId,
    },
    Prompt {
        server: ServerUrl,
        session: SessionId,
        text: String,
    },
    PermissionResponse {
        server: ServerUrl,
        session: SessionId,
        permission: PermissionId,
        response: PermissionReply,
        remember: bool,
    },
}

#[derive(Default)]
struct ServerScript {
    sessions: Vec<SessionInfo>,
    status: HashMap<SessionId, StatusField>,
    stats: HashMap<SessionId, SessionStats>,
    messages: HashMap<SessionId, Vec<MessageEnvelope>>,
    subscribe_failures: u32,
    subscribe_count: u32,
    subscribers: Vec<(mpsc::Sender<UpstreamEvent>, CancellationToken)>,
}

#[derive(Default)]
struct FakeApiState {
    servers: HashMap<ServerUrl, ServerScript>,
    commands: Vec<RecordedCommand>,
    fail_commands: bool,
    message_fetches: HashMap<SessionId, u32>,
}

/// Scriptable [`AgentApi`] for tests.
#[derive(Clone, Default)]
pub struct FakeAgentApi {
    inner: Arc<Mutex<FakeApiState>>,
}

impl FakeAgentApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the `GET /session` response for a server.
    pub fn set_sessions(&self, server: &ServerUrl, sessions: Vec<SessionInfo>) {
        self.inner.lock().servers.entry(server.clone()).or_default().sessions = sessions;
    }

    /// Mark a session active in `GET /session/status`.
    pub fn set_status(&self, server: &ServerUrl, id: &str, status: &str) {
        self.inner
            .lock()
            .servers
            .entry(server.clone())
            .or_default()
            .status
            .insert(SessionId::new(id), StatusField::Plain(status.to_string()));
    }

    pub fn clear_status(&self, server: &ServerUrl, id: &str) {
        if let Some(script) = self.inner.lock().servers.get_mut(server) {
            script.status.remove(id);
        }
    }

    pub fn set_stats(&self, server: &ServerUrl, id: &str, stats: SessionStats) {
        self.inner
            .lock()
            .servers
            .entry(server.clone())
            .or_default()
            .stats
            .insert(SessionId::new(id), stats);
    }

    pub fn set_messages(&self, server: &ServerUrl, id: &str, messages: Vec<MessageEnvelope>) {
        self.inner
            .lock()
            .servers
            .entry(server.clone())
            .or_default()
            .messages
            .insert(SessionId::new(id), messages);
    }

    /// Make the next `n` subscribe attempts fail with a 503.
    pub fn fail_subscribes(&self, server: &ServerUrl, n: u32) {
        self.inner.lock().servers.entry(server.clone()).or_default().subscribe_failures = n;
    }

    /// Make every command (abort/prompt/permission) fail with a 500.
    pub fn fail_commands(&self, enabled: bool) {
        self.inner.lock().fail_commands = enabled;
    }

    /// Inject an event into every live subscription of a server.
    pub async fn push_event(&self, server: &ServerUrl, event: UpstreamEvent) {
        let senders: Vec<mpsc::Sender<UpstreamEvent>> = {
            let mut state = self.inner.lock();
            let Some(script) = state.servers.get_mut(server) else {
                return;
            };
            script
                .subscribers
                .retain(|(tx, cancel)| !tx.is_closed() && !cancel.is_cancelled());
            script.subscribers.iter().map(|(tx, _)| tx.clone()).collect()
        };
        for tx in senders {
            let _ = tx.send(event.clone()).await;
        }
    }

    /// End every live subscription of a server, simulating a dropped stream.
    pub fn break_streams(&self, server: &ServerUrl) {
        if let Some(script) = self.inner.lock().servers.get_mut(server) {
            script.subscribers.clear();
        }
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.inner.lock().commands.clone()
    }

    pub fn subscribe_count(&self, server: &ServerUrl) -> u32 {
        self.inner.lock().servers.get(server).map(|s| s.subscribe_count).unwrap_or(0)
    }

    pub fn message_fetch_count(&self, id: &str) -> u32 {
        self.inner.lock().message_fetches.get(id).copied().unwrap_or(0)
    }

    fn check_command(&self) -> Result<(), ApiError> {
        if self.inner.lock().fail_commands {
            return Err(ApiError::Status { status: 500, url: "fake".to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl AgentApi for FakeAgentApi {
    async fn list_sessions(&self, server: &ServerUrl) -> Result<Vec<SessionInfo>, ApiError> {
        Ok(self
            .inner
            .lock()
            .servers
            .get(server)
            .map(|s| s.sessions.clone())
            .unwrap_or_default())
    }

    async fn status_map(
        &self,
        server: &ServerUrl,
    ) -> Result<HashMap<SessionId, StatusField>, ApiError> {
        Ok(self
            .inner
            .lock()
            .servers
            .get(server)
            .map(|s| s.status.clone())
            .unwrap_or_default())
    }

    async fn session(&self, server: &ServerUrl, id: &SessionId) -> Result<SessionInfo, ApiError> {
        self.inner
            .lock()
            .servers
            .get(server)
            .and_then(|s| s.sessions.iter().find(|info| info.id == id.as_str()))
            .cloned()
            .ok_or_else(|| ApiError::Status { status: 404, url: format!("fake/session/{id}") })
    }

    async fn messages(
        &self,
        server: &ServerUrl,
        id: &SessionId,
    ) -> Result<Vec<MessageEnvelope>, ApiError> {
        let mut state = self.inner.lock();
        *state.message_fetches.entry(id.clone()).or_insert(0) += 1;
        Ok(state
            .servers
            .get(server)
            .and_then(|s| s.messages.get(id))
            .cloned()
            .unwrap_or_default())
    }

    async fn stats(
        &self,
        server: &ServerUrl,
        id: &SessionId,
    ) -> Result<Option<SessionStats>, ApiError> {
        Ok(self.inner.lock().servers.get(server).and_then(|s| s.stats.get(id)).cloned())
    }

    async fn abort(&self, server: &ServerUrl, id: &SessionId) -> Result<(), ApiError> {
        self.check_command()?;
        self.inner.lock().commands.push(RecordedCommand::Abort {
            server: server.clone(),
            session: id.clone(),
        });
        Ok(())
    }

    async fn prompt(
        &self,
        server: &ServerUrl,
        id: &SessionId,
        body: &PromptBody,
    ) -> Result<(), ApiError> {
        self.check_command()?;
        let text = body.parts.first().map(|p| p.text.clone()).unwrap_or_default();
        self.inner.lock().commands.push(RecordedCommand::Prompt {
            server: server.clone(),
            session: id.clone(),
            text,
        });
        Ok(())
    }

    async fn respond_permission(
        &self,
        server: &ServerUrl,
        id: &SessionId,
        permission: &PermissionId,
        body: &PermissionResponseBody,
    ) -> Result<(), ApiError> {
        self.check_command()?;
        self.inner.lock().commands.push(RecordedCommand::PermissionResponse {
            server: server.clone(),
            session: id.clone(),
            permission: permission.clone(),
            response: body.response,
            remember: body.remember,
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        server: &ServerUrl,
        cancel: CancellationToken,
    ) -> Result<EventSubscription, ApiError> {
        let mut state = self.inner.lock();
        let script = state.servers.entry(server.clone()).or_default();
        script.subscribe_count += 1;
        if script.subscribe_failures > 0 {
            script.subscribe_failures -= 1;
            return Err(ApiError::Status {
                status: 503,
                url: format!("fake{}/event/subscribe", server),
            });
        }
        let (tx, subscription) = EventSubscription::channel(64);
        script.subscribers.push((tx, cancel));
        Ok(subscription)
    }
}

/// Recording [`NotifyAdapter`] for tests.
#[derive(Clone, Default)]
pub struct FakeNotifyAdapter {
    calls: Arc<Mutex<Vec<Notification>>>,
}

impl FakeNotifyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification sent so far.
    pub fn calls(&self) -> Vec<Notification> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl NotifyAdapter for FakeNotifyAdapter {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.calls.lock().push(notification.clone());
        Ok(())
    }
}
