// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream HTTP and SSE protocol types.
//!
//! REST DTOs are tolerant of extra keys (upstream adds fields freely).
//! SSE events arrive as `{type, properties}`; the enumerated types get
//! strict per-variant parsers and everything else becomes [`UpstreamEvent::Other`],
//! which the engine discards with a debug log.

use crate::id::{PermissionId, SessionId};
use crate::permission::{Permission, PermissionReply};
use crate::status::RawStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from event parsing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed event json: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event {event_type} missing property {property}")]
    MissingProperty { event_type: String, property: &'static str },
}

// --- REST DTOs ---

/// Creation/update timestamps on a session envelope, epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SessionTime {
    #[serde(default)]
    pub created: Option<u64>,
    #[serde(default)]
    pub updated: Option<u64>,
}

/// Upstream session status: either a bare string or `{type: "..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StatusField {
    Plain(String),
    Tagged {
        #[serde(rename = "type")]
        kind: String,
    },
}

impl StatusField {
    pub fn as_raw(&self) -> RawStatus {
        match self {
            Self::Plain(s) => RawStatus::parse(s),
            Self::Tagged { kind } => RawStatus::parse(kind),
        }
    }
}

/// One entry from `GET /session` or `GET /session/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(rename = "parentID", alias = "parentId", default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<StatusField>,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub time: SessionTime,
}

impl SessionInfo {
    pub fn raw_status(&self) -> Option<RawStatus> {
        self.status.as_ref().map(StatusField::as_raw)
    }

    pub fn created_ms(&self) -> u64 {
        self.time.created.unwrap_or(0)
    }

    pub fn updated_ms(&self) -> u64 {
        self.time.updated.or(self.time.created).unwrap_or(0)
    }
}

/// Token counters from stats or message info.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub total: Option<u64>,
}

impl TokenUsage {
    /// Upstream sometimes omits the total; fall back to the sum.
    pub fn combined(&self) -> u64 {
        self.total.unwrap_or(self.input + self.output)
    }
}

/// `GET /session/{id}/stats` (optional endpoint).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionStats {
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub tokens: Option<TokenUsage>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Metadata of one message from `GET /session/{id}/messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageInfo {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub tokens: Option<TokenUsage>,
}

/// One content part of a message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// One message envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageEnvelope {
    #[serde(default)]
    pub info: MessageInfo,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessageEnvelope {
    /// Concatenated text parts, for display.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let Some(text) = &part.text {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }
}

/// Body for `POST /session/{id}/prompt`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptBody {
    pub parts: Vec<PromptPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl PromptBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self { parts: vec![PromptPart { kind: "text".to_string(), text: text.into() }] }
    }
}

/// Body for `POST /session/{id}/permissions/{permId}`.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionResponseBody {
    pub response: PermissionReply,
    pub remember: bool,
}

// --- SSE events ---

/// A typed upstream SSE event.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    ServerConnected,
    SessionStatus { session_id: SessionId, status: RawStatus },
    SessionIdle { session_id: SessionId },
    SessionUpdated {
        session_id: SessionId,
        title: Option<String>,
        parent_id: Option<SessionId>,
        directory: Option<String>,
    },
    SessionDeleted { session_id: SessionId },
    PermissionUpdated { permission: Permission },
    PermissionReplied { session_id: SessionId, permission_id: Option<PermissionId> },
    MessageUpdated { session_id: SessionId },
    MessagePartUpdated { session_id: SessionId },
    /// Recognized shape, unrecognized type. Discarded after a debug log.
    Other { event_type: String },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    properties: Value,
}

impl UpstreamEvent {
    /// Parse the `data:` payload of one SSE frame.
    pub fn parse(data: &str) -> Result<Self, ProtocolError> {
        let raw: RawEvent = serde_json::from_str(data)?;
        Self::from_parts(raw.event_type, &raw.properties)
    }

    fn from_parts(event_type: String, props: &Value) -> Result<Self, ProtocolError> {
        let event = match event_type.as_str() {
            "server.connected" => Self::ServerConnected,
            "session.status" => Self::SessionStatus {
                session_id: required_session_id(&event_type, props)?,
                status: status_prop(props)
                    .ok_or(ProtocolError::MissingProperty {
                        event_type: event_type.clone(),
                        property: "status",
                    })?,
            },
            "session.idle" => Self::SessionIdle {
                session_id: required_session_id(&event_type, props)?,
            },
            "session.updated" => {
                let session_id = required_session_id(&event_type, props)?;
                // Fields may sit directly in properties or inside an `info`
                // envelope depending on upstream version.
                let info = props.get("info").unwrap_or(props);
                Self::SessionUpdated {
                    session_id,
                    title: str_prop(info, &["title"]),
                    parent_id: str_prop(info, &["parentID", "parentId"]).map(SessionId::new),
                    directory: str_prop(info, &["directory"]),
                }
            }
            "session.deleted" => Self::SessionDeleted {
                session_id: required_session_id(&event_type, props)?,
            },
            "permission.updated" => {
                let session_id = required_session_id(&event_type, props)?;
                let id = str_prop(props, &["permissionID", "permissionId", "id"]).ok_or(
                    ProtocolError::MissingProperty {
                        event_type: event_type.clone(),
                        property: "permissionID",
                    },
                )?;
                let args = match props.get("args") {
                    Some(Value::Object(map)) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                Self::PermissionUpdated {
                    permission: Permission {
                        id: PermissionId::new(id),
                        session_id,
                        tool: str_prop(props, &["tool"]).unwrap_or_default(),
                        args,
                        message: str_prop(props, &["message"]),
                    },
                }
            }
            "permission.replied" => Self::PermissionReplied {
                session_id: required_session_id(&event_type, props)?,
                permission_id: str_prop(props, &["permissionID", "permissionId", "id"])
                    .map(PermissionId::new),
            },
            "message.updated" => Self::MessageUpdated {
                session_id: required_session_id(&event_type, props)?,
            },
            "message.part.updated" => Self::MessagePartUpdated {
                session_id: required_session_id(&event_type, props)?,
            },
            _ => Self::Other { event_type },
        };
        Ok(event)
    }

    /// The session this event targets, when it targets one.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::SessionStatus { session_id, .. }
            | Self::SessionIdle { session_id }
            | Self::SessionUpdated { session_id, .. }
            | Self::SessionDeleted { session_id }
            | Self::PermissionReplied { session_id, .. }
            | Self::MessageUpdated { session_id }
            | Self::MessagePartUpdated { session_id } => Some(session_id),
            Self::PermissionUpdated { permission } => Some(&permission.session_id),
            Self::ServerConnected | Self::Other { .. } => None,
        }
    }
}

fn required_session_id(event_type: &str, props: &Value) -> Result<SessionId, ProtocolError> {
    str_prop(props, &["sessionID", "sessionId"]).map(SessionId::new).ok_or_else(|| {
        ProtocolError::MissingProperty {
            event_type: event_type.to_string(),
            property: "sessionID",
        }
    })
}

fn str_prop(props: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| props.get(k))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn status_prop(props: &Value) -> Option<RawStatus> {
    match props.get("status")? {
        Value::String(s) => Some(RawStatus::parse(s)),
        Value::Object(map) => map.get("type").and_then(Value::as_str).map(RawStatus::parse),
        _ => None,
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
