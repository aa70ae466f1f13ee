// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_single_frame() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data: {\"type\":\"session.idle\"}\n\n");
    assert_eq!(
        frames,
        vec![SseFrame { event: None, data: "{\"type\":\"session.idle\"}".to_string() }]
    );
}

#[test]
fn carries_state_across_chunk_boundaries() {
    let mut parser = SseParser::new();
    assert!(parser.feed(b"data: {\"a\"").is_empty());
    assert!(parser.feed(b":1}\n").is_empty());
    let frames = parser.feed(b"\n");
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, "{\"a\":1}");
}

#[test]
fn joins_multi_line_data() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data: one\ndata: two\n\n");
    assert_eq!(frames[0].data, "one\ntwo");
}

#[test]
fn tracks_event_field() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"event: message\ndata: x\n\n");
    assert_eq!(frames[0].event.as_deref(), Some("message"));
}

#[test]
fn skips_comments_and_unknown_fields() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b": keepalive\nid: 7\nretry: 100\ndata: x\n\n");
    assert_eq!(frames, vec![SseFrame { event: None, data: "x".to_string() }]);
}

#[test]
fn blank_line_without_data_is_a_noop() {
    let mut parser = SseParser::new();
    assert!(parser.feed(b"\n\n\n").is_empty());
}

#[test]
fn strips_carriage_returns() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data: x\r\n\r\n");
    assert_eq!(frames[0].data, "x");
}

#[test]
fn multiple_frames_in_one_chunk() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data: a\n\ndata: b\n\n");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].data, "a");
    assert_eq!(frames[1].data, "b");
}

#[test]
fn value_without_space_after_colon() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data:x\n\n");
    assert_eq!(frames[0].data, "x");
}
