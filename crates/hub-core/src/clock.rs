// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Monotonic timestamps and unique identifiers, kept in one tiny,
//! dependency-free module rather than sprinkling `Instant::now()` and
//! `Uuid::new_v4()` across every handler.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Wall-clock timestamp used for anything serialized to a client
/// (`joinedAt`, `lockedAt`, ...). Back-end comparisons (TTL expiry, presence
/// staleness) use [`Instant`] instead since it's immune to clock skew.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Monotonic instant used for internal expiry/staleness comparisons.
pub fn now_monotonic() -> Instant {
    Instant::now()
}

/// Generate a new random unique identifier.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// Returns true if `deadline` has passed relative to `now`.
pub fn has_elapsed(started: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(started) >= window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_elapsed_is_false_before_window() {
        let start = Instant::now();
        assert!(!has_elapsed(start, start, Duration::from_secs(5)));
    }

    #[test]
    fn has_elapsed_is_true_after_window() {
        let start = Instant::now() - Duration::from_secs(10);
        assert!(has_elapsed(start, Instant::now(), Duration::from_secs(5)));
    }

    #[test]
    fn new_id_generates_distinct_values() {
        assert_ne!(new_id(), new_id());
    }
}
