// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized server URL: the identity of a server in the registry.
//!
//! Normalization happens exactly once, at construction: scheme and host are
//! lowercased, `localhost` is rewritten to `127.0.0.1` (only that alias;
//! `::1` and friends pass through), the port is preserved, and trailing
//! slashes are stripped. Two announce packets that normalize to the same
//! value address the same server.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Errors from URL normalization
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("url has no scheme: {0}")]
    MissingScheme(String),
    #[error("url has no host: {0}")]
    MissingHost(String),
    #[error("url has invalid port: {0}")]
    InvalidPort(String),
}

/// A server URL in lowercase canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerUrl(String);

impl ServerUrl {
    /// Normalize a raw URL string into canonical form.
    pub fn normalize(raw: &str) -> Result<Self, NormalizeError> {
        let trimmed = raw.trim().trim_end_matches('/');

        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| NormalizeError::MissingScheme(raw.to_string()))?;

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };

        let (host, port) = split_authority(authority);
        if host.is_empty() {
            return Err(NormalizeError::MissingHost(raw.to_string()));
        }
        if let Some(p) = port {
            if p.parse::<u16>().is_err() {
                return Err(NormalizeError::InvalidPort(raw.to_string()));
            }
        }

        let mut host = host.to_ascii_lowercase();
        if host == "localhost" {
            host = "127.0.0.1".to_string();
        }

        let mut out = String::with_capacity(trimmed.len());
        out.push_str(&scheme.to_ascii_lowercase());
        out.push_str("://");
        out.push_str(&host);
        if let Some(p) = port {
            out.push(':');
            out.push_str(p);
        }
        out.push_str(path);

        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a path onto this URL for HTTP requests.
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

/// Split `host[:port]`, keeping bracketed IPv6 literals intact.
fn split_authority(authority: &str) -> (&str, Option<&str>) {
    if let Some(stripped) = authority.strip_prefix('[') {
        // [v6]:port or [v6]
        return match stripped.split_once(']') {
            Some((host, rest)) => {
                let port = rest.strip_prefix(':');
                (&authority[..host.len() + 2], port)
            }
            None => (authority, None),
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    }
}

impl fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ServerUrl {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ServerUrl {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ServerUrl {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
#[path = "url_tests.rs"]
mod tests;
