// MIT License - Copyright (c) 2026 Peter Wright
// Sites (premises) and their alarm status

use std::fmt;

use tracing::{debug, error};

use crate::config::ArmMode;
use crate::devices::zone::{Zone, ZoneChange};
use crate::scrape::parse_alarm_status;

/// Alarm status of a site as shown by the summary page orb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlarmStatus {
    Away,
    Home,
    Off,
    #[default]
    Unknown,
}

impl AlarmStatus {
    /// Map the `orb` attribute value to a status.
    pub fn from_orb(orb: &str) -> Self {
        match orb.trim().to_ascii_lowercase().as_str() {
            "away" => Self::Away,
            "home" | "stay" => Self::Home,
            "off" | "disarmed" => Self::Off,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Away => "away",
            Self::Home => "home",
            Self::Off => "off",
            Self::Unknown => "unknown",
        }
    }
}

impl From<ArmMode> for AlarmStatus {
    fn from(mode: ArmMode) -> Self {
        match mode {
            ArmMode::Away => Self::Away,
            ArmMode::Home => Self::Home,
            ArmMode::Off => Self::Off,
        }
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A site (premises) registered with the portal account.
#[derive(Debug, Clone)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub status: AlarmStatus,
    pub zones: Vec<Zone>,
}

impl Site {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: AlarmStatus::Unknown,
            zones: Vec::new(),
        }
    }

    pub fn is_away(&self) -> bool {
        self.status == AlarmStatus::Away
    }

    pub fn is_home(&self) -> bool {
        self.status == AlarmStatus::Home
    }

    pub fn is_disarmed(&self) -> bool {
        self.status == AlarmStatus::Off
    }

    /// Update the alarm status from a summary page.
    ///
    /// Returns `(old, new)` when the status changed. When the page carries no
    /// orb the status is left as it was.
    pub fn update_alarm_status(&mut self, summary_html: &str) -> Option<(AlarmStatus, AlarmStatus)> {
        let Some(status) = parse_alarm_status(summary_html) else {
            error!("Failed to find alarm status in summary for site {}", self.id);
            return None;
        };
        debug!("Site {} alarm status = {}", self.id, status);
        self.set_status(status)
    }

    /// Set the alarm status, returning `(old, new)` if it changed.
    pub fn set_status(&mut self, status: AlarmStatus) -> Option<(AlarmStatus, AlarmStatus)> {
        let old = self.status;
        self.status = status;
        (old != status).then_some((old, status))
    }

    /// Replace the zone list, returning zones whose status text changed.
    ///
    /// The first population reports no changes, nor do zones not seen before.
    pub fn set_zones(&mut self, zones: Vec<Zone>) -> Vec<ZoneChange> {
        let changes = zones
            .iter()
            .filter_map(|new| {
                let old = self.zone(&new.id)?;
                (old.status != new.status).then(|| ZoneChange {
                    zone_id: new.id.clone(),
                    old_status: old.status.clone(),
                    new_status: new.status.clone(),
                })
            })
            .collect();
        self.zones = zones;
        changes
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }
}
