// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session records owned by the session store.
//!
//! Mutations produce a fresh record (whole-record replacement, never partial
//! in-place mutation) so snapshot consumers can rely on value identity per
//! session.

use crate::id::SessionId;
use crate::permission::Permission;
use crate::status::RawStatus;
use crate::url::ServerUrl;
use std::time::Instant;

/// One logical conversation owned by a server; may be nested.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub owning_server_url: ServerUrl,
    pub parent_id: Option<SessionId>,
    pub title: Option<String>,
    pub raw_status: RawStatus,
    pub directory: Option<String>,
    /// Set exactly when the session transitions into an active raw status,
    /// cleared on transition out. Never touched while the session stays
    /// active.
    pub busy_since: Option<Instant>,
    pub cost: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub tokens_total: u64,
    pub model: Option<String>,
    pub pending_permission: Option<Permission>,
    pub discovered_at: Instant,
    pub stats_updated_at: Option<Instant>,
    /// Upstream wall-clock creation time, used for tree ordering.
    pub created_at_ms: u64,
    /// Upstream wall-clock update time, used for the recent-idle window.
    pub updated_at_ms: u64,
}

impl Session {
    /// Create a session discovered from an event before details are fetched.
    pub fn discovered(
        id: SessionId,
        owning_server_url: ServerUrl,
        raw_status: RawStatus,
        now: Instant,
    ) -> Self {
        let busy_since = raw_status.is_active().then_some(now);
        Self {
            id,
            owning_server_url,
            parent_id: None,
            title: None,
            raw_status,
            directory: None,
            busy_since,
            cost: 0.0,
            tokens_in: 0,
            tokens_out: 0,
            tokens_total: 0,
            model: None,
            pending_permission: None,
            discovered_at: now,
            stats_updated_at: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    /// Replace the raw status, applying the busy-since rule.
    pub fn with_status(&self, raw: RawStatus, now: Instant) -> Self {
        let busy_since = match (self.raw_status.is_active(), raw.is_active()) {
            (false, true) => Some(now),
            (true, true) => self.busy_since,
            (_, false) => None,
        };
        Self { raw_status: raw, busy_since, ..self.clone() }
    }

    /// Merge fields from a `session.updated` event. Absent fields keep
    /// their current values.
    pub fn with_update(
        &self,
        title: Option<String>,
        parent_id: Option<SessionId>,
        directory: Option<String>,
    ) -> Self {
        Self {
            title: title.or_else(|| self.title.clone()),
            parent_id: parent_id.or_else(|| self.parent_id.clone()),
            directory: directory.or_else(|| self.directory.clone()),
            ..self.clone()
        }
    }

    /// Replace the pending permission.
    pub fn with_permission(&self, permission: Option<Permission>) -> Self {
        Self { pending_permission: permission, ..self.clone() }
    }

    /// Record fetched stats.
    pub fn with_stats(
        &self,
        cost: f64,
        tokens_in: u64,
        tokens_out: u64,
        tokens_total: u64,
        model: Option<String>,
        now: Instant,
    ) -> Self {
        Self {
            cost,
            tokens_in,
            tokens_out,
            tokens_total,
            model: model.or_else(|| self.model.clone()),
            stats_updated_at: Some(now),
            ..self.clone()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod builder {
    use super::*;

    /// Test builder for session records.
    pub struct SessionBuilder {
        session: Session,
    }

    impl SessionBuilder {
        pub fn new(id: impl Into<String>, url: &ServerUrl) -> Self {
            Self {
                session: Session::discovered(
                    SessionId::new(id),
                    url.clone(),
                    RawStatus::Idle,
                    Instant::now(),
                ),
            }
        }

        pub fn status(mut self, raw: RawStatus) -> Self {
            self.session.raw_status = raw;
            self
        }

        pub fn parent(mut self, id: impl Into<String>) -> Self {
            self.session.parent_id = Some(SessionId::new(id));
            self
        }

        pub fn title(mut self, title: impl Into<String>) -> Self {
            self.session.title = Some(title.into());
            self
        }

        pub fn directory(mut self, dir: impl Into<String>) -> Self {
            self.session.directory = Some(dir.into());
            self
        }

        pub fn created_at_ms(mut self, ms: u64) -> Self {
            self.session.created_at_ms = ms;
            self
        }

        pub fn updated_at_ms(mut self, ms: u64) -> Self {
            self.session.updated_at_ms = ms;
            self
        }

        pub fn busy_since(mut self, at: Instant) -> Self {
            self.session.busy_since = Some(at);
            self
        }

        pub fn build(self) -> Session {
            self.session
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use builder::SessionBuilder;

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
