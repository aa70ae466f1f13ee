// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ocsm_core::{SessionId, UpstreamEvent};

#[tokio::test]
async fn subscription_yields_events_in_order() {
    let (tx, mut sub) = EventSubscription::channel(8);
    tx.send(UpstreamEvent::ServerConnected).await.unwrap();
    tx.send(UpstreamEvent::SessionIdle { session_id: SessionId::new("s1") }).await.unwrap();
    assert_eq!(sub.next().await, Some(UpstreamEvent::ServerConnected));
    assert_eq!(
        sub.next().await,
        Some(UpstreamEvent::SessionIdle { session_id: SessionId::new("s1") })
    );
}

#[tokio::test]
async fn dropping_sender_ends_the_stream() {
    let (tx, mut sub) = EventSubscription::channel(8);
    drop(tx);
    assert_eq!(sub.next().await, None);
}

#[test]
fn cancelled_is_not_classified_as_failure() {
    assert!(ApiError::Cancelled.is_cancelled());
    assert!(!ApiError::Status { status: 500, url: "http://h:1/x".to_string() }.is_cancelled());
}
