// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream agent HTTP + SSE client.
//!
//! One [`AgentApi`] value serves every server; each call routes by
//! [`ServerUrl`]. The SSE subscription is a pull handle: `next()` yields
//! parsed events until the stream ends, and cancellation collapses to
//! end-of-stream rather than an error.

use crate::sse::SseParser;
use async_trait::async_trait;
use futures_util::StreamExt;
use ocsm_core::{
    MessageEnvelope, PermissionId, PermissionResponseBody, PromptBody, ServerUrl, SessionId,
    SessionInfo, SessionStats, StatusField, UpstreamEvent,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors from upstream requests.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("cancelled")]
    Cancelled,
}

impl ApiError {
    /// Cancellation is not a failure; callers filter it before
    /// classifying errors for backoff.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Pull handle over a server's SSE event stream.
///
/// The sender side lives in the reader task (or a test); when it drops,
/// `next()` returns `None` and the stream is over.
pub struct EventSubscription {
    rx: mpsc::Receiver<UpstreamEvent>,
}

impl EventSubscription {
    /// Build a subscription plus its feeding side. Used by implementations
    /// and by fakes.
    pub fn channel(capacity: usize) -> (mpsc::Sender<UpstreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Next event, or `None` at end-of-stream.
    pub async fn next(&mut self) -> Option<UpstreamEvent> {
        self.rx.recv().await
    }
}

/// Client for the upstream agent API, routed by server URL.
#[async_trait]
pub trait AgentApi: Clone + Send + Sync + 'static {
    /// `GET /session`
    async fn list_sessions(&self, server: &ServerUrl) -> Result<Vec<SessionInfo>, ApiError>;

    /// `GET /session/status`: active sessions only.
    async fn status_map(
        &self,
        server: &ServerUrl,
    ) -> Result<HashMap<SessionId, StatusField>, ApiError>;

    /// `GET /session/{id}`
    async fn session(&self, server: &ServerUrl, id: &SessionId) -> Result<SessionInfo, ApiError>;

    /// `GET /session/{id}/messages`
    async fn messages(
        &self,
        server: &ServerUrl,
        id: &SessionId,
    ) -> Result<Vec<MessageEnvelope>, ApiError>;

    /// `GET /session/{id}/stats`: optional upstream endpoint; `None`
    /// when the server does not expose it.
    async fn stats(
        &self,
        server: &ServerUrl,
        id: &SessionId,
    ) -> Result<Option<SessionStats>, ApiError>;

    /// `POST /session/{id}/abort`
    async fn abort(&self, server: &ServerUrl, id: &SessionId) -> Result<(), ApiError>;

    /// `POST /session/{id}/prompt`
    async fn prompt(
        &self,
        server: &ServerUrl,
        id: &SessionId,
        body: &PromptBody,
    ) -> Result<(), ApiError>;

    /// `POST /session/{id}/permissions/{permId}`
    async fn respond_permission(
        &self,
        server: &ServerUrl,
        id: &SessionId,
        permission: &PermissionId,
        body: &PermissionResponseBody,
    ) -> Result<(), ApiError>;

    /// `GET /event/subscribe`: open the SSE stream. The returned
    /// subscription ends when the stream errors, the server closes it, or
    /// `cancel` fires.
    async fn subscribe(
        &self,
        server: &ServerUrl,
        cancel: CancellationToken,
    ) -> Result<EventSubscription, ApiError>;
}

/// Production client over reqwest.
#[derive(Clone)]
pub struct HttpAgentApi {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpAgentApi {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { client, request_timeout: Duration::from_secs(10) }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        let resp = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), url });
        }
        Ok(resp.json().await?)
    }

    async fn post_json<B: serde::Serialize + Sync>(
        &self,
        url: String,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        let mut req = self.client.post(&url).timeout(self.request_timeout);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), url });
        }
        Ok(())
    }
}

impl Default for HttpAgentApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentApi for HttpAgentApi {
    async fn list_sessions(&self, server: &ServerUrl) -> Result<Vec<SessionInfo>, ApiError> {
        self.get_json(server.join("session")).await
    }

    async fn status_map(
        &self,
        server: &ServerUrl,
    ) -> Result<HashMap<SessionId, StatusField>, ApiError> {
        self.get_json(server.join("session/status")).await
    }

    async fn session(&self, server: &ServerUrl, id: &SessionId) -> Result<SessionInfo, ApiError> {
        self.get_json(server.join(&format!("session/{id}"))).await
    }

    async fn messages(
        &self,
        server: &ServerUrl,
        id: &SessionId,
    ) -> Result<Vec<MessageEnvelope>, ApiError> {
        self.get_json(server.join(&format!("session/{id}/messages"))).await
    }

    async fn stats(
        &self,
        server: &ServerUrl,
        id: &SessionId,
    ) -> Result<Option<SessionStats>, ApiError> {
        match self.get_json(server.join(&format!("session/{id}/stats"))).await {
            Ok(stats) => Ok(Some(stats)),
            Err(ApiError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn abort(&self, server: &ServerUrl, id: &SessionId) -> Result<(), ApiError> {
        self.post_json::<()>(server.join(&format!("session/{id}/abort")), None).await
    }

    async fn prompt(
        &self,
        server: &ServerUrl,
        id: &SessionId,
        body: &PromptBody,
    ) -> Result<(), ApiError> {
        self.post_json(server.join(&format!("session/{id}/prompt")), Some(body)).await
    }

    async fn respond_permission(
        &self,
        server: &ServerUrl,
        id: &SessionId,
        permission: &PermissionId,
        body: &PermissionResponseBody,
    ) -> Result<(), ApiError> {
        self.post_json(
            server.join(&format!("session/{id}/permissions/{permission}")),
            Some(body),
        )
        .await
    }

    async fn subscribe(
        &self,
        server: &ServerUrl,
        cancel: CancellationToken,
    ) -> Result<EventSubscription, ApiError> {
        let url = server.join("event/subscribe");
        // No request timeout here: the stream is expected to live for hours.
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), url });
        }

        let (tx, subscription) = EventSubscription::channel(64);
        let server = server.clone();
        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut parser = SseParser::new();
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => break,
                    chunk = stream.next() => chunk,
                };
                let bytes = match chunk {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => {
                        tracing::debug!(server = %server, error = %e, "sse stream error");
                        break;
                    }
                    None => break,
                };
                for frame in parser.feed(&bytes) {
                    match UpstreamEvent::parse(&frame.data) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        // Protocol errors drop the event, not the stream.
                        Err(e) => {
                            tracing::debug!(server = %server, error = %e, "dropping malformed sse event");
                        }
                    }
                }
            }
        });
        Ok(subscription)
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
