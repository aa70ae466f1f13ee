// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UDP discovery wire format.
//!
//! One datagram, one JSON object, discriminated by `type`. Unknown types
//! deserialize to `Unknown` and are dropped by the listener.

use serde::{Deserialize, Serialize};

/// A discovery datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiscoveryPacket {
    /// A server announcing itself (sent periodically as a heartbeat).
    #[serde(rename = "oc.announce")]
    Announce {
        #[serde(rename = "serverUrl")]
        server_url: String,
        #[serde(rename = "instanceId")]
        instance_id: String,
        #[serde(default)]
        project: String,
        #[serde(default)]
        directory: String,
        #[serde(default)]
        branch: String,
        /// Milliseconds since epoch; absent means "now".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<u64>,
    },
    /// A server going away cleanly.
    #[serde(rename = "oc.shutdown")]
    Shutdown {
        #[serde(rename = "instanceId")]
        instance_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<u64>,
    },
    #[serde(other)]
    Unknown,
}

impl DiscoveryPacket {
    /// Parse a raw datagram. Non-UTF-8 or non-JSON input is an error;
    /// a recognized JSON object with an unrecognized `type` parses to
    /// `Unknown`.
    pub fn parse(datagram: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(datagram)
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
