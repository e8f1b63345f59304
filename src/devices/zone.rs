// MIT License - Copyright (c) 2026 Peter Wright
// Zone sensor records

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single zone (sensor) as reported by the portal's device list, flattened.
///
/// The portal nests the interesting bits under `state`; those are lifted to
/// top-level fields and anything else the portal sends is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    /// Human-readable state such as `Closed`, `Open` or `No Motion`
    pub status: Option<String>,
    /// Epoch milliseconds of the last activity reported for the zone
    pub activity_ts: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: Vec::new(),
            status: None,
            activity_ts: 0,
            extra: serde_json::Map::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_open(&self) -> bool {
        self.status_is("open")
    }

    pub fn is_closed(&self) -> bool {
        self.status_is("closed")
    }

    /// Time of the last activity, if the portal reported one.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        if self.activity_ts <= 0 {
            return None;
        }
        DateTime::<Utc>::from_timestamp_millis(self.activity_ts)
    }

    fn status_is(&self, value: &str) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(value))
    }
}

/// A zone whose status text differs from the previous fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneChange {
    pub zone_id: String,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
}
