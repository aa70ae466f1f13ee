// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fleet engine: owns the state mutex, one connection task per server,
//! the transition channel feeding the notifier, and the timers.
//!
//! Lock discipline: every critical section is synchronous and short; fetch
//! work and channel sends happen after the lock drops.

use crate::discovery::{self, DiscoveryStats};
use crate::error::EngineError;
use crate::projection::{self, Snapshot};
use crate::state::FleetState;
use crate::supervisor;
use ocsm_adapters::{AgentApi, NotifyAdapter};
use ocsm_core::{
    Clock, ConnState, DiscoveryPacket, InstanceId, MonitorConfig, Server, ServerUrl, Transition,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct ConnectionHandle {
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

/// The engine value owned by the process entry point. Presenters and the
/// session view driver hold an `Arc` of it; tests instantiate a fresh one.
pub struct Engine<A: AgentApi, N: NotifyAdapter, C: Clock> {
    pub(crate) config: MonitorConfig,
    pub(crate) api: A,
    pub(crate) notify: N,
    pub(crate) clock: C,
    pub(crate) state: Mutex<FleetState>,
    pub(crate) connections: Mutex<HashMap<ServerUrl, ConnectionHandle>>,
    transitions_tx: mpsc::Sender<Transition>,
    transitions_rx: Mutex<Option<mpsc::Receiver<Transition>>>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    pub(crate) dirty: Notify,
    pub(crate) shutdown: CancellationToken,
    pub(crate) stats: DiscoveryStats,
    tasks_started: AtomicBool,
    // Self-handle for spawning owned tasks from &self methods.
    me: Weak<Self>,
}

impl<A: AgentApi, N: NotifyAdapter, C: Clock> Engine<A, N, C> {
    pub fn new(config: MonitorConfig, api: A, notify: N, clock: C) -> Arc<Self> {
        // Bounded with headroom: transition senders block briefly rather
        // than drop, so notifications are never lost.
        let (transitions_tx, transitions_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::default()));
        Arc::new_cyclic(|me| Self {
            config,
            api,
            notify,
            clock,
            state: Mutex::new(FleetState::new()),
            connections: Mutex::new(HashMap::new()),
            transitions_tx,
            transitions_rx: Mutex::new(Some(transitions_rx)),
            snapshot_tx,
            dirty: Notify::new(),
            shutdown: CancellationToken::new(),
            stats: DiscoveryStats::default(),
            tasks_started: AtomicBool::new(false),
            me: me.clone(),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Received / dropped datagram counters.
    pub fn discovery_counts(&self) -> (u64, u64) {
        self.stats.counts()
    }

    pub(crate) fn strong(&self) -> Option<Arc<Self>> {
        self.me.upgrade()
    }

    // --- discovery entry points ---

    /// Dispatch one discovery packet. Used by the UDP listener and by the
    /// `--debug` dump mode.
    pub async fn handle_packet(&self, packet: DiscoveryPacket) {
        match packet {
            DiscoveryPacket::Announce {
                server_url,
                instance_id,
                project,
                directory,
                branch,
                ts: _,
            } => {
                self.handle_announce(
                    &server_url,
                    InstanceId::new(instance_id),
                    &project,
                    &directory,
                    &branch,
                )
                .await;
            }
            DiscoveryPacket::Shutdown { instance_id, ts: _ } => {
                self.handle_shutdown(&InstanceId::new(instance_id)).await;
            }
            DiscoveryPacket::Unknown => {
                self.stats.record_dropped();
            }
        }
    }

    pub async fn handle_announce(
        &self,
        raw_url: &str,
        instance_id: InstanceId,
        project: &str,
        directory: &str,
        branch: &str,
    ) {
        let url = match ServerUrl::normalize(raw_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(raw_url, error = %e, "dropping announce with bad url");
                self.stats.record_dropped();
                return;
            }
        };
        let now = self.clock.now();

        enum Plan {
            Create,
            Restart,
            Touch,
        }
        let plan = {
            let state = self.state.lock();
            match state.server(&url) {
                None => Plan::Create,
                Some(server) if server.instance_id != instance_id => Plan::Restart,
                Some(_) => Plan::Touch,
            }
        };

        match plan {
            Plan::Touch => {
                self.state.lock().touch_announce(&url, project, directory, branch, now);
                self.mark_dirty();
            }
            Plan::Restart => {
                tracing::info!(server = %url, instance = %instance_id, "instance changed, restarting server");
                self.remove_server(&url).await;
                self.create_server(url, instance_id, project, directory, branch);
            }
            Plan::Create => {
                tracing::info!(server = %url, instance = %instance_id, "discovered server");
                self.create_server(url, instance_id, project, directory, branch);
            }
        }
    }

    fn create_server(
        &self,
        url: ServerUrl,
        instance_id: InstanceId,
        project: &str,
        directory: &str,
        branch: &str,
    ) {
        let server = Server::announced(
            url.clone(),
            instance_id,
            project,
            directory,
            branch,
            self.clock.now(),
        );
        self.state.lock().insert_server(server);
        self.mark_dirty();
        self.spawn_connection(url);
    }

    pub async fn handle_shutdown(&self, instance_id: &InstanceId) {
        let url = { self.state.lock().server_url_by_instance(instance_id) };
        match url {
            Some(url) => {
                tracing::info!(server = %url, instance = %instance_id, "server announced shutdown");
                self.remove_server(&url).await;
            }
            // Unknown instance ids are a no-op.
            None => tracing::debug!(instance = %instance_id, "shutdown for unknown instance"),
        }
    }

    /// Remove a server: cancel its connection, wait out the grace period,
    /// then delete it and its sessions in one critical section. Idempotent.
    pub async fn remove_server(&self, url: &ServerUrl) {
        let handle = { self.connections.lock().remove(url) };
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if tokio::time::timeout(self.config.remove_grace, handle.task).await.is_err() {
                tracing::warn!(server = %url, "connection task did not exit in time, abandoning");
            }
        }
        let removed = { self.state.lock().remove_server(url) };
        if removed {
            self.mark_dirty();
        }
    }

    pub(crate) fn spawn_connection(&self, url: ServerUrl) {
        let Some(engine) = self.strong() else {
            return;
        };
        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(supervisor::run_connection(engine, url.clone(), cancel.clone()));
        let previous = self
            .connections
            .lock()
            .insert(url, ConnectionHandle { cancel, task });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    // --- timers ---

    pub async fn sweep_stale(&self) {
        let now = self.clock.now();
        let stale = { self.state.lock().stale_servers(now, self.config.server_ttl) };
        for url in stale {
            tracing::info!(server = %url, "removing stale server");
            self.remove_server(&url).await;
        }
    }

    /// Re-run the initial fetch for every connected server. Recovers from
    /// missed SSE events and upstream pruning.
    pub async fn refresh_all(&self) {
        let connected: Vec<ServerUrl> = {
            let state = self.state.lock();
            state
                .servers
                .values()
                .filter(|s| s.conn_state == ConnState::Connected)
                .map(|s| s.url.clone())
                .collect()
        };
        for url in connected {
            if let Err(e) = supervisor::fetch_and_commit(self, &url).await {
                tracing::debug!(server = %url, error = %e, "periodic refresh failed");
            }
        }
    }

    // --- projection plumbing ---

    /// Live snapshot, computed on demand. Never blocked by writers beyond
    /// the short state lock.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let state = self.state.lock();
        Arc::new(projection::build_snapshot(
            &state,
            self.clock.now(),
            self.clock.epoch_ms(),
            &self.config,
        ))
    }

    /// Subscribe to throttled snapshot publications (latest wins).
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.notify_one();
    }

    pub(crate) fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    pub(crate) async fn send_transitions(&self, transitions: Vec<Transition>) {
        for transition in transitions {
            // Blocking send: the notifier must observe every transition.
            if self.transitions_tx.send(transition).await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn take_transitions_rx(&self) -> Option<mpsc::Receiver<Transition>> {
        self.transitions_rx.lock().take()
    }

    // --- lifecycle ---

    /// Bind the discovery socket and start everything. Bind failure is
    /// fatal and reported to the caller.
    pub async fn start(&self) -> Result<(), EngineError> {
        let socket = discovery::bind_discovery_socket(self.config.udp_port)
            .map_err(|source| EngineError::Bind { port: self.config.udp_port, source })?;
        tracing::info!(port = self.config.udp_port, "discovery listener bound");
        if let Some(engine) = self.strong() {
            tokio::spawn(discovery::run_listener(engine, socket));
        }
        self.start_background_tasks();
        Ok(())
    }

    /// Start the publisher, notifier, sweeper and refresher without
    /// discovery. Tests and the `--debug` mode drive announces directly.
    pub fn start_background_tasks(&self) {
        if self.tasks_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(engine) = self.strong() else {
            return;
        };

        tokio::spawn(projection::run_publisher(Arc::clone(&engine)));
        tokio::spawn(crate::notifier::run_notifier(Arc::clone(&engine)));

        let sweeper = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweeper.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = sweeper.shutdown.cancelled() => break,
                    _ = ticker.tick() => sweeper.sweep_stale().await,
                }
            }
        });

        let refresher = engine;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresher.config.refresh_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The immediate first tick would race the initial fetches.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = refresher.shutdown.cancelled() => break,
                    _ = ticker.tick() => refresher.refresh_all().await,
                }
            }
        });
    }

    /// Stop every task and connection.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handles: Vec<ConnectionHandle> = {
            let mut connections = self.connections.lock();
            connections.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.cancel.cancel();
            let _ = tokio::time::timeout(self.config.remove_grace, handle.task).await;
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
