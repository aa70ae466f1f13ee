// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const BASE: Duration = Duration::from_secs(1);
const MAX: Duration = Duration::from_secs(30);

#[yare::parameterized(
    first = { 1, 1 },
    second = { 2, 2 },
    third = { 3, 4 },
    fourth = { 4, 8 },
    fifth = { 5, 16 },
    saturated = { 6, 30 },
    deep = { 40, 30 },
)]
fn backoff_doubles_then_saturates(attempt: u32, expected_secs: u64) {
    assert_eq!(backoff_delay(attempt, BASE, MAX), Duration::from_secs(expected_secs));
}

#[test]
fn backoff_attempt_zero_is_base() {
    assert_eq!(backoff_delay(0, BASE, MAX), BASE);
}

#[test]
fn backoff_survives_huge_attempts() {
    assert_eq!(backoff_delay(u32::MAX, BASE, MAX), MAX);
}
