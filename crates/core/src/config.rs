// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized configuration for the monitor.
//!
//! Everything is env-var driven with fixed defaults; tests construct the
//! struct directly and shrink the horizons.

use std::time::Duration;

/// Tunable horizons and periods for the fleet engine.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// UDP discovery port (`OC_SESSION_PORT`).
    pub udp_port: u16,
    /// Heartbeat horizon for effective-status staleness (`OC_SESSION_TIMEOUT`).
    pub instance_ttl: Duration,
    /// Horizon after which the sweep removes a silent server.
    pub server_ttl: Duration,
    /// Busy duration after which a session is flagged long-running
    /// (`OC_SESSION_LONG_RUNNING`, minutes).
    pub long_running: Duration,
    /// Master switch for desktop notifications (`OCSM_NO_NOTIFY` disables).
    pub notifications_enabled: bool,
    /// Staleness sweep cadence.
    pub sweep_interval: Duration,
    /// Global session refresh cadence.
    pub refresh_interval: Duration,
    /// Reconnect backoff base delay.
    pub backoff_base: Duration,
    /// Reconnect backoff ceiling.
    pub backoff_max: Duration,
    /// Idle sessions updated within this window stay in the relevant set.
    pub recent_idle_window: Duration,
    /// Minimum spacing between message refreshes in the session view.
    pub message_debounce: Duration,
    /// Snapshot publish coalescing window.
    pub snapshot_throttle: Duration,
    /// How long `remove` waits for a connection task to exit before
    /// abandoning it.
    pub remove_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            udp_port: 19876,
            instance_ttl: Duration::from_secs(120),
            server_ttl: Duration::from_secs(180),
            long_running: Duration::from_secs(10 * 60),
            notifications_enabled: true,
            sweep_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            recent_idle_window: Duration::from_secs(10 * 60),
            message_debounce: Duration::from_millis(250),
            snapshot_throttle: Duration::from_millis(100),
            remove_grace: Duration::from_secs(2),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = env_parse::<u16>("OC_SESSION_PORT") {
            config.udp_port = port;
        }
        if let Some(secs) = env_parse::<u64>("OC_SESSION_TIMEOUT") {
            // The instance TTL is the configured horizon; the server TTL
            // keeps its 1.5x headroom so the registry outlives a single
            // missed heartbeat.
            config.instance_ttl = Duration::from_secs(secs);
            config.server_ttl = Duration::from_secs(secs + secs / 2);
        }
        if let Some(mins) = env_parse::<u64>("OC_SESSION_LONG_RUNNING") {
            config.long_running = Duration::from_secs(mins * 60);
        }
        if std::env::var("OCSM_NO_NOTIFY").map(|v| v == "1").unwrap_or(false) {
            config.notifications_enabled = false;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
