// MIT License - Copyright (c) 2026 Peter Wright
// Portal devices

pub mod site;
pub mod zone;

pub use site::{AlarmStatus, Site};
pub use zone::{Zone, ZoneChange};
