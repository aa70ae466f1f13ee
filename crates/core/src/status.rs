// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw and effective session status.
//!
//! Raw status is whatever the upstream server last reported. Effective
//! status is derived on every read: a session is `stale` when its server's
//! heartbeat is older than the horizon (or the raw status is shutdown),
//! `busy` when the raw status is an active one, `idle` otherwise.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session status as reported by the upstream server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawStatus {
    Idle,
    Running,
    Pending,
    Busy,
    Shutdown,
    Unknown,
}

crate::simple_display! {
    RawStatus {
        Idle => "idle",
        Running => "running",
        Pending => "pending",
        Busy => "busy",
        Shutdown => "shutdown",
        Unknown => "unknown",
    }
}

impl RawStatus {
    /// Parse an upstream status string. Anything unrecognized maps to
    /// `Unknown` rather than failing the event.
    pub fn parse(s: &str) -> Self {
        match s {
            "idle" => Self::Idle,
            "running" => Self::Running,
            "pending" => Self::Pending,
            "busy" => Self::Busy,
            "shutdown" => Self::Shutdown,
            _ => Self::Unknown,
        }
    }

    /// Whether this status counts as actively working.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Busy | Self::Running | Self::Pending)
    }
}

/// Status derived from raw status plus heartbeat age. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveStatus {
    Idle,
    Busy,
    Stale,
}

crate::simple_display! {
    EffectiveStatus {
        Idle => "idle",
        Busy => "busy",
        Stale => "stale",
    }
}

impl EffectiveStatus {
    /// Derive the effective status for a session.
    ///
    /// `heartbeat_age` is how long ago the owning server last announced.
    pub fn derive(raw: RawStatus, heartbeat_age: Duration, horizon: Duration) -> Self {
        if heartbeat_age > horizon || raw == RawStatus::Shutdown {
            Self::Stale
        } else if raw.is_active() {
            Self::Busy
        } else {
            Self::Idle
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Busy)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
