// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ocsm-adapters: I/O adapters for the OpenCode session monitor.
//!
//! Two seams: [`AgentApi`] (upstream HTTP + SSE) and [`NotifyAdapter`]
//! (desktop notifications). Both come with fakes behind the `test-support`
//! feature.

pub mod api;
pub mod notify;
pub mod sse;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use api::{AgentApi, ApiError, EventSubscription, HttpAgentApi};
pub use notify::{DesktopNotifyAdapter, Notification, NotifyAdapter, NotifyError};
pub use sse::{SseFrame, SseParser};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgentApi, FakeNotifyAdapter, RecordedCommand};
