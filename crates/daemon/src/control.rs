// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon control for the CLI: status probe and stop.

use crate::lifecycle::{Config, PidFile};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Result of a status probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    NotRunning,
    Running { pid: i32 },
}

/// Check whether the daemon recorded in the PID file is alive.
/// A stale file (dead PID) reads as not running.
pub fn status(config: &Config) -> DaemonStatus {
    match PidFile::read(&config.pid_path) {
        Some(pid) if process_alive(pid) => DaemonStatus::Running { pid },
        _ => DaemonStatus::NotRunning,
    }
}

/// SIGTERM the daemon and remove the PID file. Returns whether a running
/// daemon was actually stopped.
pub fn stop(config: &Config) -> bool {
    let was_running = match PidFile::read(&config.pid_path) {
        Some(pid) if process_alive(pid) => {
            let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
            true
        }
        _ => false,
    };
    PidFile::remove(&config.pid_path);
    was_running
}

/// Signal 0 probe: checks existence without touching the process.
fn process_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
