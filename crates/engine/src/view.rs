// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session view driver: the focused-session subscription the presenter
//! binds to.
//!
//! Entering a session builds the depth-annotated tree list, loads its
//! messages, and opens a session-scoped watch on the server's event
//! stream. Message refreshes are throttled to one per debounce window
//! with a trailing refresh for coalesced triggers.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::state::FleetState;
use ocsm_adapters::{AgentApi, NotifyAdapter};
use ocsm_core::{
    Clock, MessageEnvelope, PermissionId, PermissionReply, PermissionResponseBody, PromptBody,
    RawStatus, ServerUrl, Session, SessionId, UpstreamEvent,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One row of the flattened session tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub id: SessionId,
    pub depth: usize,
    pub title: Option<String>,
}

/// Pre-order flattening of the focus session's tree: root first, children
/// sorted by creation time, each row annotated with its depth.
pub(crate) fn flatten_tree(state: &FleetState, focus: &SessionId) -> Vec<TreeEntry> {
    let Some(mut root) = state.session(focus) else {
        return Vec::new();
    };
    let mut hops = 0;
    while let Some(parent) = root.parent_id.as_ref().and_then(|p| state.session(p)) {
        hops += 1;
        if hops > state.sessions.len() {
            break;
        }
        root = parent;
    }

    let mut children: HashMap<&SessionId, Vec<&Session>> = HashMap::new();
    for session in state.sessions.values() {
        if let Some(parent) = &session.parent_id {
            children.entry(parent).or_default().push(session);
        }
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then(a.id.cmp(&b.id)));
    }

    let mut flat = Vec::new();
    let mut stack: Vec<(&Session, usize)> = vec![(root, 0)];
    while let Some((session, depth)) = stack.pop() {
        flat.push(TreeEntry {
            id: session.id.clone(),
            depth,
            title: session.title.clone(),
        });
        if let Some(kids) = children.get(&session.id) {
            // Reversed so the stack pops them in creation order.
            for kid in kids.iter().rev() {
                stack.push((*kid, depth + 1));
            }
        }
    }
    flat
}

/// A live view over one session tree.
///
/// Dropping the view (or calling [`SessionView::exit`]) cancels its
/// subscription and refresh tasks.
pub struct SessionView<A: AgentApi, N: NotifyAdapter, C: Clock> {
    engine: Arc<Engine<A, N, C>>,
    server_url: ServerUrl,
    tree: Vec<TreeEntry>,
    focus_index: usize,
    focus: Arc<Mutex<SessionId>>,
    messages: Arc<Mutex<Vec<MessageEnvelope>>>,
    error_slot: Arc<Mutex<Option<String>>>,
    cancel: CancellationToken,
}

impl<A: AgentApi, N: NotifyAdapter, C: Clock> Engine<A, N, C> {
    /// Enter a session: build the tree, load messages, start the
    /// session-scoped event watch.
    pub async fn open_view(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionView<A, N, C>, EngineError> {
        let Some(me) = self.strong() else {
            return Err(EngineError::UnknownSession(session_id.to_string()));
        };
        let (server_url, tree) = {
            let state = self.state.lock();
            let session = state
                .session(session_id)
                .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
            (session.owning_server_url.clone(), flatten_tree(&state, session_id))
        };
        let focus_index = tree.iter().position(|e| &e.id == session_id).unwrap_or(0);
        let focus = Arc::new(Mutex::new(session_id.clone()));
        let messages = Arc::new(Mutex::new(Vec::new()));
        let cancel = self.shutdown.child_token();

        // Coalescing trigger: capacity 1, extra triggers during a window
        // collapse into one trailing refresh.
        let (refresh_tx, mut refresh_rx) = mpsc::channel::<()>(1);

        {
            let engine = Arc::clone(&me);
            let server_url = server_url.clone();
            let focus = Arc::clone(&focus);
            let messages = Arc::clone(&messages);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let trigger = tokio::select! {
                        _ = cancel.cancelled() => return,
                        trigger = refresh_rx.recv() => trigger,
                    };
                    if trigger.is_none() {
                        return;
                    }
                    fetch_messages(&engine, &server_url, &focus, &messages).await;
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(engine.config.message_debounce) => {}
                    }
                }
            });
        }

        {
            let engine = Arc::clone(&me);
            let server_url = server_url.clone();
            let focus = Arc::clone(&focus);
            let cancel = cancel.clone();
            let refresh_tx = refresh_tx.clone();
            tokio::spawn(async move {
                let mut subscription =
                    match engine.api.subscribe(&server_url, cancel.clone()).await {
                        Ok(subscription) => subscription,
                        Err(e) => {
                            if !e.is_cancelled() {
                                tracing::debug!(server = %server_url, error = %e, "view subscribe failed");
                            }
                            return;
                        }
                    };
                loop {
                    let event = tokio::select! {
                        _ = cancel.cancelled() => return,
                        event = subscription.next() => event,
                    };
                    let Some(event) = event else {
                        return;
                    };
                    let focused = { focus.lock().clone() };
                    match &event {
                        UpstreamEvent::MessageUpdated { session_id }
                        | UpstreamEvent::MessagePartUpdated { session_id }
                            if session_id == &focused =>
                        {
                            let _ = refresh_tx.try_send(());
                        }
                        _ => {}
                    }
                }
            });
        }

        let view = SessionView {
            engine: me,
            server_url,
            tree,
            focus_index,
            focus,
            messages,
            error_slot: Arc::new(Mutex::new(None)),
            cancel,
        };
        view.reload_messages().await;
        Ok(view)
    }
}

async fn fetch_messages<A, N, C>(
    engine: &Arc<Engine<A, N, C>>,
    server_url: &ServerUrl,
    focus: &Arc<Mutex<SessionId>>,
    messages: &Arc<Mutex<Vec<MessageEnvelope>>>,
) where
    A: AgentApi,
    N: NotifyAdapter,
    C: Clock,
{
    let id = { focus.lock().clone() };
    match engine.api.messages(server_url, &id).await {
        Ok(fetched) => *messages.lock() = fetched,
        Err(e) => {
            if !e.is_cancelled() {
                tracing::debug!(session = %id, error = %e, "message refresh failed");
            }
        }
    }
}

impl<A: AgentApi, N: NotifyAdapter, C: Clock> SessionView<A, N, C> {
    pub fn tree(&self) -> &[TreeEntry] {
        &self.tree
    }

    pub fn focus_index(&self) -> usize {
        self.focus_index
    }

    pub fn focused_id(&self) -> SessionId {
        self.focus.lock().clone()
    }

    pub fn messages(&self) -> Vec<MessageEnvelope> {
        self.messages.lock().clone()
    }

    /// Last command failure, if any. Cleared by the next success.
    pub fn error(&self) -> Option<String> {
        self.error_slot.lock().clone()
    }

    /// Whether the focused session still exists in the store. The focus
    /// dies with its server.
    pub fn is_live(&self) -> bool {
        let focused = self.focused_id();
        self.engine.state.lock().session(&focused).is_some()
    }

    pub async fn switch_next(&mut self) {
        self.move_focus(1).await;
    }

    pub async fn switch_prev(&mut self) {
        self.move_focus(-1).await;
    }

    async fn move_focus(&mut self, delta: isize) {
        if self.tree.is_empty() {
            return;
        }
        let len = self.tree.len() as isize;
        let next = (self.focus_index as isize + delta).rem_euclid(len) as usize;
        self.focus_index = next;
        let id = self.tree[next].id.clone();
        {
            *self.focus.lock() = id;
        }
        self.reload_messages().await;
    }

    async fn reload_messages(&self) {
        fetch_messages(&self.engine, &self.server_url, &self.focus, &self.messages).await;
    }

    /// Abort the focused session. On success the session is marked idle
    /// locally; the server's own event confirms shortly after.
    pub async fn abort(&self) {
        let id = self.focused_id();
        match self.engine.api.abort(&self.server_url, &id).await {
            Ok(()) => {
                let outcome = {
                    self.engine.state.lock().apply_status(
                        &self.server_url,
                        &id,
                        RawStatus::Idle,
                        self.engine.clock.now(),
                        self.engine.clock.epoch_ms(),
                        self.engine.config.instance_ttl,
                    )
                };
                self.engine.mark_dirty();
                if let Some(transition) = outcome.transition {
                    self.engine.send_transitions(vec![transition]).await;
                }
                *self.error_slot.lock() = None;
            }
            Err(e) => self.record_command_error(e),
        }
    }

    /// Send a prompt to the focused session. Empty input is a no-op; the
    /// session is optimistically marked busy before the POST.
    pub async fn send_prompt(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let id = self.focused_id();
        {
            self.engine.state.lock().apply_status(
                &self.server_url,
                &id,
                RawStatus::Busy,
                self.engine.clock.now(),
                self.engine.clock.epoch_ms(),
                self.engine.config.instance_ttl,
            );
        }
        self.engine.mark_dirty();
        match self
            .engine
            .api
            .prompt(&self.server_url, &id, &PromptBody::text(text))
            .await
        {
            Ok(()) => *self.error_slot.lock() = None,
            Err(e) => self.record_command_error(e),
        }
    }

    /// Answer the focused session's pending permission.
    pub async fn respond_permission(
        &self,
        permission: &PermissionId,
        reply: PermissionReply,
        remember: bool,
    ) {
        let id = self.focused_id();
        let body = PermissionResponseBody { response: reply, remember };
        match self
            .engine
            .api
            .respond_permission(&self.server_url, &id, permission, &body)
            .await
        {
            Ok(()) => {
                let cleared = { self.engine.state.lock().clear_permission(&id) };
                if cleared {
                    self.engine.mark_dirty();
                }
                *self.error_slot.lock() = None;
            }
            Err(e) => self.record_command_error(e),
        }
    }

    fn record_command_error(&self, error: ocsm_adapters::ApiError) {
        if error.is_cancelled() {
            return;
        }
        *self.error_slot.lock() = Some(error.to_string());
    }

    /// Leave the view, cancelling its subscription.
    pub fn exit(self) {
        self.cancel.cancel();
    }
}

impl<A: AgentApi, N: NotifyAdapter, C: Clock> Drop for SessionView<A, N, C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
