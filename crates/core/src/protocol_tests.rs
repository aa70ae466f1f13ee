// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::{PermissionId, SessionId};
use crate::permission::PermissionReply;
use crate::status::RawStatus;

// --- REST DTOs ---

#[test]
fn session_info_accepts_minimal_envelope() {
    let info: SessionInfo = serde_json::from_str(r#"{"id":"s1"}"#).unwrap();
    assert_eq!(info.id, "s1");
    assert!(info.parent_id.is_none());
    assert_eq!(info.created_ms(), 0);
}

#[test]
fn session_info_reads_upstream_field_names() {
    let info: SessionInfo = serde_json::from_str(
        r#"{"id":"s1","parentID":"s0","title":"t","status":"running",
            "directory":"/d","time":{"created":100,"updated":200},"extra":true}"#,
    )
    .unwrap();
    assert_eq!(info.parent_id.as_deref(), Some("s0"));
    assert_eq!(info.raw_status(), Some(RawStatus::Running));
    assert_eq!(info.created_ms(), 100);
    assert_eq!(info.updated_ms(), 200);
}

#[test]
fn status_field_accepts_string_or_tagged_object() {
    let plain: StatusField = serde_json::from_str(r#""busy""#).unwrap();
    assert_eq!(plain.as_raw(), RawStatus::Busy);
    let tagged: StatusField = serde_json::from_str(r#"{"type":"pending"}"#).unwrap();
    assert_eq!(tagged.as_raw(), RawStatus::Pending);
}

#[test]
fn updated_ms_falls_back_to_created() {
    let info: SessionInfo =
        serde_json::from_str(r#"{"id":"s1","time":{"created":100}}"#).unwrap();
    assert_eq!(info.updated_ms(), 100);
}

#[test]
fn token_usage_combined_prefers_total() {
    let with_total: TokenUsage =
        serde_json::from_str(r#"{"input":10,"output":20,"total":35}"#).unwrap();
    assert_eq!(with_total.combined(), 35);
    let without: TokenUsage = serde_json::from_str(r#"{"input":10,"output":20}"#).unwrap();
    assert_eq!(without.combined(), 30);
}

#[test]
fn message_text_joins_parts() {
    let msg: MessageEnvelope = serde_json::from_str(
        r#"{"info":{"role":"assistant"},"parts":[
            {"type":"text","text":"a"},{"type":"tool"},{"type":"text","text":"b"}]}"#,
    )
    .unwrap();
    assert_eq!(msg.text(), "a\nb");
}

#[test]
fn prompt_body_serializes_to_upstream_shape() {
    let body = PromptBody::text("hello");
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json, serde_json::json!({"parts":[{"type":"text","text":"hello"}]}));
}

#[test]
fn permission_response_body_shape() {
    let body = PermissionResponseBody { response: PermissionReply::Allow, remember: false };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json, serde_json::json!({"response":"allow","remember":false}));
}

// --- SSE events ---

#[test]
fn parses_session_status_with_string_status() {
    let event = UpstreamEvent::parse(
        r#"{"type":"session.status","properties":{"sessionID":"s1","status":"running"}}"#,
    )
    .unwrap();
    assert_eq!(
        event,
        UpstreamEvent::SessionStatus {
            session_id: SessionId::new("s1"),
            status: RawStatus::Running
        }
    );
}

#[test]
fn parses_session_status_with_tagged_status() {
    let event = UpstreamEvent::parse(
        r#"{"type":"session.status","properties":{"sessionID":"s1","status":{"type":"busy"}}}"#,
    )
    .unwrap();
    assert_eq!(
        event,
        UpstreamEvent::SessionStatus { session_id: SessionId::new("s1"), status: RawStatus::Busy }
    );
}

#[test]
fn parses_session_idle() {
    let event =
        UpstreamEvent::parse(r#"{"type":"session.idle","properties":{"sessionID":"s1"}}"#)
            .unwrap();
    assert_eq!(event, UpstreamEvent::SessionIdle { session_id: SessionId::new("s1") });
}

#[test]
fn parses_session_updated_with_nested_info() {
    let event = UpstreamEvent::parse(
        r#"{"type":"session.updated","properties":{"sessionID":"s1",
            "info":{"title":"t","parentID":"s0","directory":"/d"}}}"#,
    )
    .unwrap();
    assert_eq!(
        event,
        UpstreamEvent::SessionUpdated {
            session_id: SessionId::new("s1"),
            title: Some("t".to_string()),
            parent_id: Some(SessionId::new("s0")),
            directory: Some("/d".to_string()),
        }
    );
}

#[test]
fn parses_permission_updated() {
    let event = UpstreamEvent::parse(
        r#"{"type":"permission.updated","properties":{
            "sessionID":"s1","permissionID":"p1","tool":"bash","args":{"cmd":"ls"}}}"#,
    )
    .unwrap();
    let UpstreamEvent::PermissionUpdated { permission } = event else {
        panic!("expected permission.updated");
    };
    assert_eq!(permission.id, PermissionId::new("p1"));
    assert_eq!(permission.session_id, SessionId::new("s1"));
    assert_eq!(permission.tool, "bash");
    assert_eq!(permission.args.get("cmd"), Some(&serde_json::json!("ls")));
}

#[test]
fn parses_permission_replied_without_id() {
    let event = UpstreamEvent::parse(
        r#"{"type":"permission.replied","properties":{"sessionID":"s1"}}"#,
    )
    .unwrap();
    assert_eq!(
        event,
        UpstreamEvent::PermissionReplied {
            session_id: SessionId::new("s1"),
            permission_id: None
        }
    );
}

#[test]
fn unknown_event_types_become_other() {
    let event = UpstreamEvent::parse(r#"{"type":"installation.updated","properties":{}}"#)
        .unwrap();
    assert_eq!(event, UpstreamEvent::Other { event_type: "installation.updated".to_string() });
}

#[test]
fn missing_session_id_is_a_protocol_error() {
    let err = UpstreamEvent::parse(r#"{"type":"session.idle","properties":{}}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::MissingProperty { property: "sessionID", .. }));
}

#[test]
fn malformed_json_is_a_protocol_error() {
    let err = UpstreamEvent::parse("{nope").unwrap_err();
    assert!(matches!(err, ProtocolError::Malformed(_)));
}

#[test]
fn session_id_accessor_covers_targeted_events() {
    let event =
        UpstreamEvent::parse(r#"{"type":"message.updated","properties":{"sessionID":"s1"}}"#)
            .unwrap();
    assert_eq!(event.session_id(), Some(&SessionId::new("s1")));
    assert_eq!(UpstreamEvent::ServerConnected.session_id(), None);
}
