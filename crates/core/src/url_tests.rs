// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain = { "http://192.168.1.5:4096", "http://192.168.1.5:4096" },
    trailing_slash = { "http://192.168.1.5:4096/", "http://192.168.1.5:4096" },
    many_slashes = { "http://192.168.1.5:4096///", "http://192.168.1.5:4096" },
    localhost = { "http://localhost:4096", "http://127.0.0.1:4096" },
    localhost_cased = { "http://LocalHost:4096", "http://127.0.0.1:4096" },
    scheme_cased = { "HTTP://HOST.example:80", "http://host.example:80" },
    no_port = { "http://localhost", "http://127.0.0.1" },
    whitespace = { "  http://h:1/  ", "http://h:1" },
)]
fn normalize_canonical_forms(raw: &str, expected: &str) {
    let url = ServerUrl::normalize(raw).unwrap();
    assert_eq!(url.as_str(), expected);
}

#[test]
fn normalize_preserves_ipv6_loopback() {
    // Only the `localhost` alias is rewritten; ::1 stays as announced.
    let url = ServerUrl::normalize("http://[::1]:4096/").unwrap();
    assert_eq!(url.as_str(), "http://[::1]:4096");
}

#[test]
fn normalize_keeps_path_segments() {
    let url = ServerUrl::normalize("http://h:1/api/").unwrap();
    assert_eq!(url.as_str(), "http://h:1/api");
}

#[yare::parameterized(
    no_scheme = { "localhost:4096" },
    empty = { "" },
    bare_slashes = { "http:///" },
)]
fn normalize_rejects_malformed(raw: &str) {
    assert!(ServerUrl::normalize(raw).is_err());
}

#[test]
fn normalize_rejects_non_numeric_port() {
    assert_eq!(
        ServerUrl::normalize("http://h:notaport"),
        Err(NormalizeError::InvalidPort("http://h:notaport".to_string()))
    );
}

#[test]
fn identical_packets_normalize_identically() {
    let a = ServerUrl::normalize("http://localhost:4096/").unwrap();
    let b = ServerUrl::normalize("http://127.0.0.1:4096").unwrap();
    assert_eq!(a, b);
}

#[test]
fn join_builds_request_paths() {
    let url = ServerUrl::normalize("http://h:1/").unwrap();
    assert_eq!(url.join("session"), "http://h:1/session");
    assert_eq!(url.join("/session/s1/abort"), "http://h:1/session/s1/abort");
}
