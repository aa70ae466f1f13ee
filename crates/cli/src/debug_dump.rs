// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `--debug`: foreground UDP packet dump.
//!
//! Binds the discovery port and prints one line per datagram with the
//! parse verdict, without touching any engine state.

use anyhow::Result;
use ocsm_core::{DiscoveryPacket, MonitorConfig, ServerUrl};
use ocsm_engine::bind_discovery_socket;

pub async fn run() -> Result<()> {
    let config = MonitorConfig::from_env();
    let socket = bind_discovery_socket(config.udp_port)?;
    println!("listening on udp/{} (ctrl-c to exit)", config.udp_port);

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (len, peer) = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            received = socket.recv_from(&mut buf) => received?,
        };
        match DiscoveryPacket::parse(&buf[..len]) {
            Ok(DiscoveryPacket::Announce {
                server_url,
                instance_id,
                project,
                branch,
                ..
            }) => {
                let normalized = match ServerUrl::normalize(&server_url) {
                    Ok(url) => url.to_string(),
                    Err(e) => format!("<bad url: {e}>"),
                };
                println!("{peer} announce {normalized} instance={instance_id} {project}:{branch}");
            }
            Ok(DiscoveryPacket::Shutdown { instance_id, .. }) => {
                println!("{peer} shutdown instance={instance_id}");
            }
            Ok(DiscoveryPacket::Unknown) => {
                println!("{peer} dropped: unknown packet type");
            }
            Err(e) => {
                println!("{peer} dropped: {e}");
            }
        }
    }
}
