// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending tool-use permission requests.

use crate::id::{PermissionId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A permission request waiting for an operator response.
///
/// `args` is an opaque key/value bag; the monitor renders it but never
/// interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub session_id: SessionId,
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Operator reply to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionReply {
    Allow,
    Deny,
}

crate::simple_display! {
    PermissionReply {
        Allow => "allow",
        Deny => "deny",
    }
}
