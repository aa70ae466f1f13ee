// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-server connection lifecycle.
//!
//! One task per server walks connecting -> connected -> disconnected with
//! exponential backoff. Cancellation is cooperative through the server's
//! token and wins over every other outcome.

use crate::engine::Engine;
use crate::state::{relevant_set, FetchedSession};
use ocsm_adapters::{AgentApi, ApiError, NotifyAdapter};
use ocsm_core::{Clock, RawStatus, ServerUrl, SessionInfo};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Reconnect delay: `min(max, base * 2^(attempt-1))` for attempt >= 1.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(2u32.saturating_pow(exponent)).min(max)
}

enum Outcome {
    Cancelled,
    ConnectFailed,
    StreamEnded,
}

/// The connection task for one server. Exits only on cancellation.
pub(crate) async fn run_connection<A, N, C>(
    engine: Arc<Engine<A, N, C>>,
    url: ServerUrl,
    cancel: CancellationToken,
) where
    A: AgentApi,
    N: NotifyAdapter,
    C: Clock,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        {
            engine.state.lock().set_connecting(&url);
        }
        engine.mark_dirty();

        match connect_and_pump(&engine, &url, &cancel).await {
            Outcome::Cancelled => return,
            Outcome::ConnectFailed => {
                attempt += 1;
            }
            // The connect succeeded, so the counter restarts for the
            // retry that follows the dropped stream.
            Outcome::StreamEnded => {
                attempt = 1;
            }
        }

        {
            engine.state.lock().set_disconnected(&url, attempt, engine.clock.now());
        }
        engine.mark_dirty();
        let delay = backoff_delay(attempt, engine.config.backoff_base, engine.config.backoff_max);
        tracing::debug!(server = %url, attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn connect_and_pump<A, N, C>(
    engine: &Engine<A, N, C>,
    url: &ServerUrl,
    cancel: &CancellationToken,
) -> Outcome
where
    A: AgentApi,
    N: NotifyAdapter,
    C: Clock,
{
    let fetched = tokio::select! {
        _ = cancel.cancelled() => return Outcome::Cancelled,
        result = fetch_and_commit(engine, url) => result,
    };
    if let Err(e) = fetched {
        if e.is_cancelled() {
            return Outcome::Cancelled;
        }
        tracing::debug!(server = %url, error = %e, "initial fetch failed");
        return Outcome::ConnectFailed;
    }

    let mut subscription = tokio::select! {
        _ = cancel.cancelled() => return Outcome::Cancelled,
        result = engine.api.subscribe(url, cancel.clone()) => match result {
            Ok(subscription) => subscription,
            Err(e) => {
                if e.is_cancelled() {
                    return Outcome::Cancelled;
                }
                tracing::debug!(server = %url, error = %e, "sse subscribe failed");
                return Outcome::ConnectFailed;
            }
        },
    };

    {
        engine.state.lock().set_connected(url);
    }
    engine.mark_dirty();
    tracing::info!(server = %url, "connected");

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return Outcome::Cancelled,
            event = subscription.next() => event,
        };
        match event {
            Some(event) => engine.ingest(url, event).await,
            None if cancel.is_cancelled() => return Outcome::Cancelled,
            None => {
                tracing::debug!(server = %url, "event stream ended");
                return Outcome::StreamEnded;
            }
        }
    }
}

/// Pull the list and active-status endpoints, compute the relevant set,
/// fetch details and stats for it, and commit the result. Used for the
/// initial fetch on connect and the periodic refresh.
pub(crate) async fn fetch_and_commit<A, N, C>(
    engine: &Engine<A, N, C>,
    url: &ServerUrl,
) -> Result<(), ApiError>
where
    A: AgentApi,
    N: NotifyAdapter,
    C: Clock,
{
    let (list, active) =
        tokio::try_join!(engine.api.list_sessions(url), engine.api.status_map(url))?;

    let directory = {
        engine.state.lock().server(url).map(|s| s.directory.clone()).unwrap_or_default()
    };
    let relevant = relevant_set(
        &list,
        &active,
        &directory,
        engine.clock.epoch_ms(),
        engine.config.recent_idle_window,
    );

    let by_id: HashMap<&str, &SessionInfo> =
        list.iter().map(|info| (info.id.as_str(), info)).collect();
    let mut fetched = Vec::with_capacity(relevant.len());
    for id in &relevant {
        let info = match by_id.get(id.as_str()) {
            Some(info) => (*info).clone(),
            None => match engine.api.session(url, id).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::debug!(session = %id, error = %e, "details fetch failed");
                    continue;
                }
            },
        };
        let raw = active
            .get(id)
            .map(|status| status.as_raw())
            .or_else(|| info.raw_status())
            .unwrap_or(RawStatus::Idle);
        let stats = engine.api.stats(url, id).await.unwrap_or_default();
        fetched.push(FetchedSession { info, raw, stats });
    }

    let transitions = {
        engine.state.lock().commit_fetch(
            url,
            fetched,
            engine.clock.now(),
            engine.clock.epoch_ms(),
            engine.config.instance_ttl,
        )
    };
    engine.mark_dirty();
    engine.send_transitions(transitions).await;
    Ok(())
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
