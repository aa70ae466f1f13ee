// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `ocsm` - OpenCode session fleet monitor.
//!
//! Default invocation runs the interactive TUI. `--daemon` detaches a
//! headless copy of this binary (discovery + notifications only);
//! `--status` and `--stop` control it; `--debug` dumps discovery packets
//! in the foreground.

mod debug_dump;
mod tui;

use anyhow::{anyhow, Result};
use clap::Parser;
use ocsm_adapters::{DesktopNotifyAdapter, HttpAgentApi};
use ocsm_core::{MonitorConfig, SystemClock};
use ocsm_daemon::{status, stop, Config, DaemonStatus};
use ocsm_engine::Engine;

/// Marker env var for the re-exec'd daemon worker process.
const DAEMON_WORKER_ENV: &str = "OCSM_DAEMON_WORKER";

#[derive(Parser)]
#[command(name = "ocsm", version, about = "Monitor OpenCode agent sessions on the local network")]
struct Cli {
    /// Detach and run headless (discovery + notifier only)
    #[arg(long, conflicts_with_all = ["status", "stop", "debug"])]
    daemon: bool,

    /// Print the daemon PID, or "not running"
    #[arg(long, conflicts_with_all = ["stop", "debug"])]
    status: bool,

    /// Stop the daemon and remove its PID file
    #[arg(long, conflicts_with = "debug")]
    stop: bool,

    /// Run in the foreground and dump received UDP packets
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    if std::env::var(DAEMON_WORKER_ENV).map(|v| v == "1").unwrap_or(false) {
        return ocsm_daemon::run_headless(&config).await.map_err(Into::into);
    }

    if cli.daemon {
        return detach_daemon(&config);
    }
    if cli.status {
        match status(&config) {
            DaemonStatus::Running { pid } => println!("daemon running (pid {pid})"),
            DaemonStatus::NotRunning => println!("not running"),
        }
        return Ok(());
    }
    if cli.stop {
        if stop(&config) {
            println!("daemon stopped");
        } else {
            println!("not running");
        }
        return Ok(());
    }
    if cli.debug {
        return debug_dump::run().await;
    }

    run_tui(&config).await
}

/// Spawn a detached copy of ourselves as the daemon worker.
fn detach_daemon(config: &Config) -> Result<()> {
    if let DaemonStatus::Running { pid } = status(config) {
        println!("daemon already running (pid {pid})");
        return Ok(());
    }
    let exe = std::env::current_exe()?;
    std::process::Command::new(exe)
        .env(DAEMON_WORKER_ENV, "1")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to spawn daemon: {e}"))?;
    println!("daemon started");
    Ok(())
}

async fn run_tui(config: &Config) -> Result<()> {
    // The terminal belongs to the renderer; diagnostics go to the log file.
    let _log_guard = ocsm_daemon::run::init_logging(config)?;

    let monitor_config = MonitorConfig::from_env();
    let notify = DesktopNotifyAdapter::detect();
    let engine = Engine::new(monitor_config, HttpAgentApi::new(), notify, SystemClock);
    engine.start().await?;

    let result = tui::run(engine.clone()).await;
    engine.stop().await;
    result
}
