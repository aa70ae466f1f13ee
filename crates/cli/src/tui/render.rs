// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering for the fleet table and the session drill-in view.

use super::app::{App, Mode};
use ocsm_adapters::{AgentApi, NotifyAdapter};
use ocsm_core::{Clock, ConnState, EffectiveStatus};
use ocsm_engine::SessionSnapshot;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Wrap};
use ratatui::Frame;
use std::time::Duration;

pub fn draw<A: AgentApi, N: NotifyAdapter, C: Clock>(frame: &mut Frame, app: &App<A, N, C>) {
    match app.mode() {
        Mode::Fleet => draw_fleet(frame, app),
        Mode::Session | Mode::Prompt => draw_session(frame, app),
    }
}

fn status_style(effective: EffectiveStatus) -> Style {
    match effective {
        EffectiveStatus::Busy => Style::default().fg(Color::Yellow),
        EffectiveStatus::Idle => Style::default().fg(Color::Green),
        EffectiveStatus::Stale => Style::default().fg(Color::DarkGray),
    }
}

fn fmt_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

fn session_label(session: &SessionSnapshot) -> String {
    session.title.clone().unwrap_or_else(|| session.id.to_string())
}

fn draw_fleet<A: AgentApi, N: NotifyAdapter, C: Clock>(frame: &mut Frame, app: &App<A, N, C>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let snapshot = app.snapshot();
    let rows: Vec<Row> = snapshot
        .sessions
        .iter()
        .enumerate()
        .map(|(index, session)| {
            let server_label = snapshot
                .server(&session.server_url)
                .map(|s| {
                    if s.conn_state == ConnState::Connected {
                        s.label.clone()
                    } else {
                        format!("{} ({})", s.label, s.conn_state)
                    }
                })
                .unwrap_or_else(|| session.server_url.to_string());
            let busy = session.busy_for.map(fmt_duration).unwrap_or_default();
            let status = if session.long_running {
                format!("{} !", session.effective)
            } else {
                session.effective.to_string()
            };
            let mut style = status_style(session.effective);
            if index == app.selected() {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Row::new(vec![
                Cell::from(server_label),
                Cell::from(format!("{}{}", "  ".repeat(depth_of(session)), session_label(session))),
                Cell::from(status),
                Cell::from(busy),
                Cell::from(format!("${:.2}", session.cost)),
                Cell::from(session.tokens_total.to_string()),
                Cell::from(session.model.clone().unwrap_or_default()),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(24),
            Constraint::Min(20),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(16),
        ],
    )
    .header(
        Row::new(vec!["SERVER", "SESSION", "STATUS", "BUSY", "COST", "TOKENS", "MODEL"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(" ocsm session fleet "));
    frame.render_widget(table, chunks[0]);

    let (received, dropped) = app.engine().discovery_counts();
    let footer = Line::from(vec![
        Span::raw(format!(
            " {} servers · {} sessions · udp {}/{} dropped ",
            snapshot.servers.len(),
            snapshot.sessions.len(),
            received,
            dropped,
        )),
        Span::styled(
            "· enter: open · j/k: move · q: quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(footer), chunks[1]);
}

/// Indentation depth from the parent chain available in the snapshot.
fn depth_of(session: &SessionSnapshot) -> usize {
    usize::from(session.parent_id.is_some())
}

fn draw_session<A: AgentApi, N: NotifyAdapter, C: Clock>(frame: &mut Frame, app: &App<A, N, C>) {
    let Some(view) = app.view() else {
        return;
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
        .split(frame.area());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(20)])
        .split(chunks[0]);

    let focused = view.focused_id();
    let items: Vec<ListItem> = view
        .tree()
        .iter()
        .map(|entry| {
            let label = entry.title.clone().unwrap_or_else(|| entry.id.to_string());
            let mut style = Style::default();
            if entry.id == focused {
                style = style.add_modifier(Modifier::REVERSED);
            }
            ListItem::new(format!("{}{}", "  ".repeat(entry.depth), label)).style(style)
        })
        .collect();
    let tree = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" sessions "));
    frame.render_widget(tree, columns[0]);

    let messages = view.messages();
    let mut lines: Vec<Line> = Vec::new();
    for message in messages.iter().rev().take(50).rev() {
        let role = message.info.role.clone().unwrap_or_else(|| "message".to_string());
        lines.push(Line::from(Span::styled(
            role,
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for text_line in message.text().lines() {
            lines.push(Line::from(text_line.to_string()));
        }
    }
    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(format!(" {focused} ")));
    frame.render_widget(body, columns[1]);

    // Permission banner or command error, one line.
    let status_line = if let Some(permission) = app
        .snapshot()
        .session(&focused)
        .and_then(|s| s.pending_permission.clone())
    {
        Line::from(Span::styled(
            format!(" permission requested: {} (y allow / d deny) ", permission.tool),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ))
    } else if let Some(error) = view.error() {
        Line::from(Span::styled(
            format!(" {error} "),
            Style::default().fg(Color::White).bg(Color::Red),
        ))
    } else {
        Line::from(Span::styled(
            " n/p: switch · a: abort · i: prompt · q: back ",
            Style::default().fg(Color::DarkGray),
        ))
    };
    frame.render_widget(Paragraph::new(status_line), chunks[1]);

    let input_line = if app.mode() == Mode::Prompt {
        Line::from(vec![Span::raw("> "), Span::raw(app.input().to_string())])
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(input_line), chunks[2]);
}
