// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive terminal presenter.
//!
//! A thin consumer of the engine's snapshot channel: state lives in the
//! engine, commands go through the session view driver. Only this module
//! writes to the terminal.

mod app;
mod render;

pub use app::{App, Mode};

use anyhow::Result;
use crossterm::event::{Event, EventStream};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures_util::StreamExt;
use ocsm_adapters::{DesktopNotifyAdapter, HttpAgentApi};
use ocsm_core::SystemClock;
use ocsm_engine::Engine;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

pub type LiveEngine = Arc<Engine<HttpAgentApi, DesktopNotifyAdapter, SystemClock>>;

/// Raw-mode/alternate-screen guard; restores the terminal on drop even
/// when the loop errors out.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
    }
}

/// Run the TUI until the operator quits.
pub async fn run(engine: LiveEngine) -> Result<()> {
    let mut guard = TerminalGuard::enter()?;
    let mut snapshots = engine.subscribe();
    let mut app = App::new(engine);
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        guard.terminal.draw(|frame| render::draw(frame, &app))?;
        tokio::select! {
            // Pull on the tick so ages and staleness advance even while
            // nothing publishes.
            _ = tick.tick() => app.pull_snapshot(),
            changed = snapshots.changed() => {
                if changed.is_ok() {
                    let snapshot = snapshots.borrow_and_update().clone();
                    app.set_snapshot(snapshot);
                }
            }
            maybe_event = events.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_event {
                    app.handle_key(key).await;
                }
            }
        }
        if app.should_quit() {
            return Ok(());
        }
    }
}
