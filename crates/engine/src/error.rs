// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Per-server failures never escape the engine; what surfaces here is
//! either a startup failure (UDP bind) or a command failure destined for
//! the session view's error slot.

use ocsm_adapters::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Fatal at startup: the discovery socket could not be bound.
    #[error("failed to bind discovery socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A forwarded command (abort/prompt/permission) failed upstream.
    #[error("command failed: {0}")]
    Command(#[from] ApiError),

    /// The requested focus session is not in the store.
    #[error("unknown session: {0}")]
    UnknownSession(String),
}
