// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition consumer: turns qualifying transitions into desktop
//! notifications, one per transition, best-effort.

use crate::engine::Engine;
use ocsm_adapters::{AgentApi, Notification, NotifyAdapter};
use ocsm_core::Clock;
use std::sync::Arc;

pub(crate) async fn run_notifier<A, N, C>(engine: Arc<Engine<A, N, C>>)
where
    A: AgentApi,
    N: NotifyAdapter,
    C: Clock,
{
    let Some(mut rx) = engine.take_transitions_rx() else {
        return;
    };
    loop {
        let transition = tokio::select! {
            _ = engine.shutdown.cancelled() => return,
            transition = rx.recv() => transition,
        };
        let Some(transition) = transition else {
            return;
        };
        if !engine.config.notifications_enabled {
            continue;
        }
        // Cold-start noise guard: only active -> inactive moves and fresh
        // permission requests reach the desktop.
        if !transition.warrants_notification() {
            continue;
        }
        let notification = Notification {
            title: "OpenCode".to_string(),
            subtitle: transition.server_label.clone(),
            body: transition.body(),
        };
        if let Err(e) = engine.notify.notify(&notification).await {
            tracing::debug!(error = %e, "notification delivery failed");
        }
    }
}
