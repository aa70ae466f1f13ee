// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TUI application state and key handling.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ocsm_adapters::{AgentApi, NotifyAdapter};
use ocsm_core::{Clock, PermissionReply};
use ocsm_engine::{Engine, SessionView, Snapshot};
use std::sync::Arc;

/// What the keyboard currently drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fleet table; selection moves over sessions.
    Fleet,
    /// Drilled into one session.
    Session,
    /// Typing a prompt for the focused session.
    Prompt,
}

pub struct App<A: AgentApi, N: NotifyAdapter, C: Clock> {
    engine: Arc<Engine<A, N, C>>,
    snapshot: Arc<Snapshot>,
    selected: usize,
    view: Option<SessionView<A, N, C>>,
    input: String,
    mode: Mode,
    quit: bool,
}

impl<A: AgentApi, N: NotifyAdapter, C: Clock> App<A, N, C> {
    pub fn new(engine: Arc<Engine<A, N, C>>) -> Self {
        let snapshot = engine.snapshot();
        Self {
            engine,
            snapshot,
            selected: 0,
            view: None,
            input: String::new(),
            mode: Mode::Fleet,
            quit: false,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn view(&self) -> Option<&SessionView<A, N, C>> {
        self.view.as_ref()
    }

    pub fn engine(&self) -> &Arc<Engine<A, N, C>> {
        &self.engine
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Pull a live snapshot (ages and staleness move between publishes).
    pub fn pull_snapshot(&mut self) {
        let snapshot = self.engine.snapshot();
        self.apply_snapshot(snapshot);
    }

    pub fn set_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        self.apply_snapshot(snapshot);
    }

    fn apply_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        self.snapshot = snapshot;
        self.selected = self.selected.min(self.snapshot.sessions.len().saturating_sub(1));
        // The focus dies with its server; fall back to the fleet table.
        if let Some(view) = &self.view {
            if !view.is_live() {
                self.close_view();
            }
        }
    }

    fn close_view(&mut self) {
        if let Some(view) = self.view.take() {
            view.exit();
        }
        self.input.clear();
        self.mode = Mode::Fleet;
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        match self.mode {
            Mode::Fleet => self.handle_fleet_key(key.code).await,
            Mode::Session => self.handle_session_key(key.code).await,
            Mode::Prompt => self.handle_prompt_key(key.code).await,
        }
    }

    async fn handle_fleet_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.snapshot.sessions.len().saturating_sub(1);
                self.selected = (self.selected + 1).min(last);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Enter => {
                let Some(session) = self.snapshot.sessions.get(self.selected) else {
                    return;
                };
                match self.engine.open_view(&session.id).await {
                    Ok(view) => {
                        self.view = Some(view);
                        self.mode = Mode::Session;
                    }
                    Err(e) => tracing::debug!(error = %e, "cannot open session view"),
                }
            }
            _ => {}
        }
    }

    async fn handle_session_key(&mut self, code: KeyCode) {
        let Some(view) = self.view.as_mut() else {
            self.mode = Mode::Fleet;
            return;
        };
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.close_view(),
            KeyCode::Right | KeyCode::Char('n') => view.switch_next().await,
            KeyCode::Left | KeyCode::Char('p') => view.switch_prev().await,
            KeyCode::Char('a') => view.abort().await,
            KeyCode::Char('y') | KeyCode::Char('d') => {
                let focused = view.focused_id();
                let pending = self
                    .snapshot
                    .session(&focused)
                    .and_then(|s| s.pending_permission.clone());
                if let Some(permission) = pending {
                    let reply = if code == KeyCode::Char('y') {
                        PermissionReply::Allow
                    } else {
                        PermissionReply::Deny
                    };
                    view.respond_permission(&permission.id, reply, false).await;
                }
            }
            KeyCode::Char('i') => {
                self.input.clear();
                self.mode = Mode::Prompt;
            }
            _ => {}
        }
    }

    async fn handle_prompt_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.input.clear();
                self.mode = Mode::Session;
            }
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.input);
                if let Some(view) = self.view.as_ref() {
                    view.send_prompt(&text).await;
                }
                self.mode = Mode::Session;
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
