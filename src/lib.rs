// MIT License - Copyright (c) 2026 Peter Wright
// ADT Pulse portal client
//
//! # adt-pulse
//!
//! Client for the ADT Pulse web portal.
//!
//! The portal has no public API, so this library drives it the way a browser
//! does: a cookie-backed form login, scraping of the summary page for the
//! site and its alarm status, the zone JSON the portal's own scripts poll, and
//! the sync-token endpoint that signals when anything has changed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use adt_pulse::{ArmMode, PulseClient, PulseConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PulseConfig::builder()
//!         .username("owner@example.com")
//!         .password("hunter2")
//!         .build();
//!
//!     let client = PulseClient::connect(config).await?;
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     if let Some(site) = client.sites().await.first() {
//!         client.arm(&site.id, ArmMode::Away).await?;
//!     }
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod devices;
pub mod error;
pub mod event;
pub mod protocol;
pub mod scrape;
pub mod session;
pub mod sync;

// Re-exports for convenience
pub use client::PulseClient;
pub use config::{ArmMode, PulseConfig, PulseConfigBuilder};
pub use devices::site::{AlarmStatus, Site};
pub use devices::zone::{Zone, ZoneChange};
pub use error::{PulseError, Result};
pub use event::{EventReceiver, PulseEvent};
pub use protocol::{Endpoint, Method, PulseResponse, QueryOptions};
pub use session::PulseSession;
pub use sync::{SyncOutcome, SyncTracker};
