// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desktop notification adapter.
//!
//! Delivery is a shell one-liner through the platform notifier binary:
//! `osascript` on macOS, `notify-send` elsewhere. Notifications are
//! best-effort; a failed exec is logged and swallowed. Availability is
//! probed once at startup so a missing binary disables the capability
//! instead of failing every transition.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from notify operations.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier unavailable: {0}")]
    Unavailable(&'static str),
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Content of one desktop notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    /// `project:branch` of the owning server.
    pub subtitle: String,
    pub body: String,
}

/// Adapter for sending notifications.
#[async_trait]
pub trait NotifyAdapter: Clone + Send + Sync + 'static {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Escape a string for interpolation inside single quotes in a shell line:
/// each `'` closes the quote, inserts an escaped quote, and reopens it.
pub fn shell_single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Escape a string for an AppleScript double-quoted literal.
fn applescript_quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Platform notifier binary for the current OS.
fn notifier_program() -> &'static str {
    if cfg!(target_os = "macos") {
        "osascript"
    } else {
        "notify-send"
    }
}

/// Build the shell line that delivers the notification.
fn build_command_line(notification: &Notification) -> String {
    if cfg!(target_os = "macos") {
        let script = format!(
            "display notification \"{}\" with title \"{}\" subtitle \"{}\"",
            applescript_quote(&notification.body),
            applescript_quote(&notification.title),
            applescript_quote(&notification.subtitle),
        );
        format!("osascript -e {}", shell_single_quote(&script))
    } else {
        format!(
            "notify-send {} {}",
            shell_single_quote(&format!("{}: {}", notification.title, notification.subtitle)),
            shell_single_quote(&notification.body),
        )
    }
}

/// Desktop notification adapter backed by the platform notifier binary.
#[derive(Clone, Copy, Debug)]
pub struct DesktopNotifyAdapter {
    available: bool,
}

impl DesktopNotifyAdapter {
    /// Probe the PATH for the notifier binary. Called once at startup;
    /// when the binary is missing the adapter reports unavailable and
    /// every send becomes a cheap no-op error.
    pub fn detect() -> Self {
        let program = notifier_program();
        let available = program_on_path(program);
        if !available {
            tracing::warn!(program, "notifier binary not found, notifications disabled");
        }
        Self { available }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }
}

fn program_on_path(program: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(program).is_file())
}

#[async_trait]
impl NotifyAdapter for DesktopNotifyAdapter {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if !self.available {
            return Err(NotifyError::Unavailable(notifier_program()));
        }
        let line = build_command_line(notification);
        tracing::debug!(%line, "sending desktop notification");
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&line)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        if !status.success() {
            return Err(NotifyError::SendFailed(format!("notifier exited with {status}")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
