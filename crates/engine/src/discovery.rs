// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UDP discovery listener.
//!
//! Receives announce/shutdown datagrams and forwards them to the engine.
//! Malformed or unrecognized datagrams are counted and dropped; the only
//! fatal failure is the initial bind.

use crate::engine::Engine;
use ocsm_adapters::{AgentApi, NotifyAdapter};
use ocsm_core::{Clock, DiscoveryPacket};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Datagram counters for diagnostics.
#[derive(Debug, Default)]
pub struct DiscoveryStats {
    received: AtomicU64,
    dropped: AtomicU64,
}

impl DiscoveryStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// `(received, dropped)` so far.
    pub fn counts(&self) -> (u64, u64) {
        (self.received.load(Ordering::Relaxed), self.dropped.load(Ordering::Relaxed))
    }
}

/// Bind the discovery socket with address reuse, so a restarting monitor
/// does not trip over the previous socket lingering in TIME_WAIT.
pub fn bind_discovery_socket(port: u16) -> std::io::Result<tokio::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;
    tokio::net::UdpSocket::from_std(socket.into())
}

/// The listener task: receive, parse, forward. Never does I/O beyond the
/// UDP receive; all effects go through the engine.
pub(crate) async fn run_listener<A, N, C>(
    engine: Arc<Engine<A, N, C>>,
    socket: tokio::net::UdpSocket,
) where
    A: AgentApi,
    N: NotifyAdapter,
    C: Clock,
{
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let received = tokio::select! {
            _ = engine.shutdown.cancelled() => return,
            received = socket.recv_from(&mut buf) => received,
        };
        let (len, peer) = match received {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!(error = %e, "udp receive failed");
                continue;
            }
        };
        engine.stats.record_received();
        match DiscoveryPacket::parse(&buf[..len]) {
            Ok(DiscoveryPacket::Unknown) => {
                tracing::debug!(%peer, "dropping datagram with unknown type");
                engine.stats.record_dropped();
            }
            Ok(packet) => engine.handle_packet(packet).await,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "dropping malformed datagram");
                engine.stats.record_dropped();
            }
        }
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
