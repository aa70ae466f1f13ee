// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn stats_count_received_and_dropped() {
    let stats = DiscoveryStats::default();
    stats.record_received();
    stats.record_received();
    stats.record_dropped();
    assert_eq!(stats.counts(), (2, 1));
}

#[tokio::test]
async fn bind_produces_a_usable_udp_socket() {
    let socket = bind_discovery_socket(0).unwrap();
    let addr = socket.local_addr().unwrap();
    assert_ne!(addr.port(), 0);

    let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(b"{}", ("127.0.0.1", addr.port())).await.unwrap();
    let mut buf = [0u8; 16];
    let (len, _) = socket.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..len], b"{}");
}
