// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Headless daemon run loop: the engine with a null presenter.
//!
//! Discovery, connections and notifications run exactly as under the TUI;
//! the only differences are file logging and SIGTERM-driven shutdown.

use crate::lifecycle::{Config, LifecycleError, PidFile};
use ocsm_adapters::{DesktopNotifyAdapter, HttpAgentApi};
use ocsm_core::{MonitorConfig, SystemClock};
use ocsm_engine::Engine;
use tracing_subscriber::EnvFilter;

/// Route tracing output to the daemon log file. The returned guard must
/// outlive the run loop or buffered lines are lost.
pub fn init_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

/// Run discovery + notifier until SIGTERM/SIGINT. Holds the PID file for
/// the whole run.
pub async fn run_headless(config: &Config) -> Result<(), LifecycleError> {
    let pid_file = PidFile::acquire(&config.pid_path)?;
    let _log_guard = init_logging(config)?;
    tracing::info!(pid = std::process::id(), "daemon starting");

    let monitor_config = MonitorConfig::from_env();
    let notify = DesktopNotifyAdapter::detect();
    if !notify.is_available() {
        tracing::warn!("no notifier binary on PATH; running without desktop notifications");
    }
    let engine = Engine::new(monitor_config, HttpAgentApi::new(), notify, SystemClock);
    engine.start().await?;

    wait_for_shutdown_signal().await;
    tracing::info!("daemon shutting down");
    engine.stop().await;
    drop(pid_file);
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!(error = %e, "cannot install SIGTERM handler");
            // Fall back to ctrl-c only.
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = term.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
