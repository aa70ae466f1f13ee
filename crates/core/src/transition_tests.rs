// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::SessionId;
use crate::status::EffectiveStatus;

fn transition(kind: TransitionKind) -> Transition {
    Transition {
        session_id: SessionId::new("s1"),
        kind,
        title_hint: None,
        server_label: "p:main".to_string(),
        at_ms: 1000,
    }
}

#[yare::parameterized(
    busy_to_idle = { EffectiveStatus::Busy, EffectiveStatus::Idle, true },
    busy_to_stale = { EffectiveStatus::Busy, EffectiveStatus::Stale, true },
    idle_to_busy = { EffectiveStatus::Idle, EffectiveStatus::Busy, false },
    idle_to_stale = { EffectiveStatus::Idle, EffectiveStatus::Stale, false },
    stale_to_idle = { EffectiveStatus::Stale, EffectiveStatus::Idle, false },
)]
fn status_transitions_warranting_notification(
    old: EffectiveStatus,
    new: EffectiveStatus,
    expected: bool,
) {
    let t = transition(TransitionKind::Status { old, new });
    assert_eq!(t.warrants_notification(), expected);
}

#[test]
fn permission_requests_always_warrant_notification() {
    let t = transition(TransitionKind::PermissionRequested { tool: "bash".to_string() });
    assert!(t.warrants_notification());
}

#[test]
fn body_prefers_title_hint() {
    let mut t = transition(TransitionKind::Status {
        old: EffectiveStatus::Busy,
        new: EffectiveStatus::Idle,
    });
    t.title_hint = Some("refactor the parser".to_string());
    assert_eq!(t.body(), "refactor the parser");
}

#[test]
fn body_defaults_for_idle_transition() {
    let t = transition(TransitionKind::Status {
        old: EffectiveStatus::Busy,
        new: EffectiveStatus::Idle,
    });
    assert_eq!(t.body(), "Session is idle");
}

#[test]
fn body_names_tool_for_permission() {
    let t = transition(TransitionKind::PermissionRequested { tool: "bash".to_string() });
    assert_eq!(t.body(), "Permission requested: bash");
}

#[test]
fn empty_title_hint_falls_back_to_default() {
    let mut t = transition(TransitionKind::Status {
        old: EffectiveStatus::Busy,
        new: EffectiveStatus::Idle,
    });
    t.title_hint = Some(String::new());
    assert_eq!(t.body(), "Session is idle");
}
