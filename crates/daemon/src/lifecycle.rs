// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: state paths and the locked PID file.

use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine a state directory")]
    NoStateDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("daemon already running (pid file locked): {0}")]
    LockFailed(std::io::Error),
    #[error("engine startup failed: {0}")]
    Engine(#[from] ocsm_engine::EngineError),
}

/// Daemon file layout under the state directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    /// PID file doubling as the single-instance lock.
    pub pid_path: PathBuf,
    /// Append-only diagnostic log.
    pub log_path: PathBuf,
}

impl Config {
    /// Fixed paths under the resolved state directory. One daemon per user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        Ok(Self {
            pid_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            state_dir,
        })
    }
}

/// An exclusively locked PID file. The lock lives as long as this value;
/// dropping it removes the file.
pub struct PidFile {
    // NOTE(lifetime): held to keep the exclusive lock; released on drop.
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl PidFile {
    /// Acquire the lock and record our PID.
    ///
    /// The file is opened without truncation first: truncating before the
    /// lock is held would wipe a running daemon's PID.
    pub fn acquire(path: &Path) -> Result<Self, LifecycleError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
        let mut file = file;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        Ok(Self { file, path: path.to_path_buf() })
    }

    /// Read the recorded PID, if the file exists and parses.
    pub fn read(path: &Path) -> Option<i32> {
        let contents = std::fs::read_to_string(path).ok()?;
        contents.trim().parse().ok()
    }

    /// Best-effort removal of a PID file nobody holds.
    pub fn remove(path: &Path) {
        let _ = std::fs::remove_file(path);
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
