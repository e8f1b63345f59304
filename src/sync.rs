// MIT License - Copyright (c) 2026 Peter Wright
// Sync-token tracking

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::constants::INITIAL_SYNC_TOKEN;

static SYNC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-\d+-\d+").expect("valid sync token pattern"));

/// Result of comparing a sync-check response with the stored token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Token identical to the stored one; nothing new on the portal.
    Unchanged,
    /// Token differs; the caller should re-fetch site and zone state.
    Changed { previous: String, token: String },
    /// The response is not a `N-N-N` token (typically a signed-out page).
    Malformed,
}

impl SyncOutcome {
    /// Whether the caller should treat the portal as having updates.
    pub fn updates_exist(&self) -> bool {
        !matches!(self, SyncOutcome::Unchanged)
    }
}

/// Tracks the portal's dash-delimited version token and the timestamp
/// parameter sent with each sync check.
#[derive(Debug, Clone)]
pub struct SyncTracker {
    token: String,
    last_timestamp_ms: i64,
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self {
            token: INITIAL_SYNC_TOKEN.to_string(),
            last_timestamp_ms: 0,
        }
    }
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn last_timestamp_ms(&self) -> i64 {
        self.last_timestamp_ms
    }

    /// Timestamp for the next sync check: epoch milliseconds, strictly
    /// greater than any previously returned value.
    pub fn next_timestamp(&mut self) -> i64 {
        self.advance_to(Utc::now().timestamp_millis())
    }

    fn advance_to(&mut self, now_ms: i64) -> i64 {
        self.last_timestamp_ms = now_ms.max(self.last_timestamp_ms + 1);
        self.last_timestamp_ms
    }

    /// Compare a sync-check response body with the stored token.
    ///
    /// A differing token replaces the stored one. A malformed body leaves the
    /// stored token untouched.
    pub fn observe(&mut self, body: &str) -> SyncOutcome {
        let text = body.trim();
        if !SYNC_TOKEN.is_match(text) {
            return SyncOutcome::Malformed;
        }
        if text == self.token {
            return SyncOutcome::Unchanged;
        }
        let previous = std::mem::replace(&mut self.token, text.to_string());
        SyncOutcome::Changed {
            previous,
            token: text.to_string(),
        }
    }
}
