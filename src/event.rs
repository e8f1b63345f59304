// MIT License - Copyright (c) 2026 Peter Wright
// Client events

use crate::devices::site::AlarmStatus;

/// All events that can be emitted by the client.
///
/// Users subscribe via `client.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<PulseEvent>`.
#[derive(Debug, Clone, PartialEq)]
pub enum PulseEvent {
    /// Login accepted by the portal
    Authenticated,
    /// Session closed via logout
    LoggedOut,
    /// Sites parsed from the summary page after the first login
    SitesDiscovered { count: usize },
    /// Alarm status of a site changed
    AlarmStatusChanged {
        site_id: String,
        old_status: AlarmStatus,
        new_status: AlarmStatus,
    },
    /// Zone list of a site re-fetched
    ZonesUpdated { site_id: String, count: usize },
    /// Status text of a zone changed between fetches
    ZoneStatusChanged {
        site_id: String,
        zone_id: String,
        old_status: Option<String>,
        new_status: Option<String>,
    },
    /// Sync check returned a new token
    UpdatesAvailable { token: String },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<PulseEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<PulseEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
