// MIT License - Copyright (c) 2026 Peter Wright
// Portal client: sites, zones and alarm commands

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::{ArmMode, PulseConfig};
use crate::devices::site::{AlarmStatus, Site};
use crate::devices::zone::Zone;
use crate::error::{PulseError, Result};
use crate::event::{event_channel, EventReceiver, EventSender, PulseEvent};
use crate::protocol::{arm_form, Endpoint, PulseResponse, QueryOptions};
use crate::scrape::{parse_site_info, parse_zones_str};
use crate::session::PulseSession;
use crate::sync::SyncOutcome;

/// The main public API for an ADT Pulse account.
///
/// # Example
///
/// ```no_run
/// use adt_pulse::{ArmMode, PulseClient, PulseConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = PulseConfig::builder()
///         .username("owner@example.com")
///         .password("hunter2")
///         .build();
///
///     let client = PulseClient::connect(config).await?;
///
///     let mut events = client.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     for site in client.sites().await {
///         println!("Site {} ({}): {}", site.name, site.id, site.status);
///         for zone in client.zones(&site.id).await? {
///             println!("  {}: {:?}", zone.name, zone.status);
///         }
///         client.arm(&site.id, ArmMode::Home).await?;
///     }
///
///     if client.updates_exist().await? {
///         client.refresh().await?;
///     }
///
///     client.logout().await?;
///     Ok(())
/// }
/// ```
pub struct PulseClient {
    session: PulseSession,
    event_tx: EventSender,
    sites: Arc<RwLock<Vec<Site>>>,
    fetch_zones_on_login: bool,
}

impl PulseClient {
    /// Create a client without logging in.
    pub fn new(config: PulseConfig) -> Result<Self> {
        let (event_tx, _event_rx) = event_channel(256);
        let fetch_zones_on_login = config.fetch_zones_on_login;
        let session = PulseSession::new(config, event_tx.clone())?;

        Ok(Self {
            session,
            event_tx,
            sites: Arc::new(RwLock::new(Vec::new())),
            fetch_zones_on_login,
        })
    }

    /// Create a client and log in.
    ///
    /// Retries on transient errors (timeouts, connection failures, 5xx) with
    /// exponential backoff. The base delay is `reconnect_delay_ms` from the
    /// config and the maximum number of retries is `max_connect_retries`.
    /// Rejected credentials fail immediately.
    pub async fn connect(config: PulseConfig) -> Result<Self> {
        let max_retries = config.max_connect_retries;
        let base_delay_ms = config.reconnect_delay_ms;

        let client = Self::new(config)?;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay_ms = base_delay_ms * (1 << (attempt - 1).min(4));
                warn!(
                    "Login attempt {} failed, retrying in {:.1}s...",
                    attempt,
                    delay_ms as f64 / 1000.0
                );
                sleep(Duration::from_millis(delay_ms)).await;
            }

            let result = client.login().await;
            match result {
                Ok(()) => return Ok(client),
                Err(e) => {
                    if !e.is_retryable() || attempt == max_retries {
                        return Err(e);
                    }
                    warn!("Login error (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(PulseError::NotConnected))
    }

    /// Subscribe to client events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub fn username(&self) -> &str {
        self.session.username()
    }

    pub fn config(&self) -> &PulseConfig {
        self.session.config()
    }

    pub async fn version(&self) -> Result<String> {
        self.session.version().await
    }

    pub async fn is_connected(&self) -> bool {
        self.session.is_connected().await
    }

    pub async fn sync_token(&self) -> String {
        self.session.sync_token().await
    }

    /// Log in and populate sites from the summary page.
    ///
    /// The first login discovers the site; later logins only refresh its
    /// alarm status. Zones are fetched afterwards when `fetch_zones_on_login`
    /// is enabled.
    pub async fn login(&self) -> Result<()> {
        let summary = self.session.login().await?;
        self.apply_summary(&summary).await;

        if self.fetch_zones_on_login {
            for id in self.site_ids().await {
                if let Err(e) = self.fetch_zones(&id).await {
                    warn!("Failed to fetch zones for site {}: {}", id, e);
                }
            }
        }
        Ok(())
    }

    /// Log out of the portal. Cached sites are kept.
    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await
    }

    /// Force a fresh login, which re-reads the summary page and zones.
    pub async fn update(&self) -> Result<()> {
        info!("Updating ADT Pulse status");
        self.session.set_logged_out().await;
        self.login().await
    }

    /// Re-read the summary page and every site's zones over the current session.
    pub async fn refresh(&self) -> Result<()> {
        let response = self
            .query(Endpoint::Summary.uri(), QueryOptions::get())
            .await?;
        ensure_success(Endpoint::Summary, &response)?;
        self.apply_summary(&response.body).await;

        for id in self.site_ids().await {
            self.fetch_zones(&id).await?;
        }
        Ok(())
    }

    /// Issue a raw query through the session's retry and re-login handling.
    ///
    /// A re-login made along the way refreshes the cached alarm status from
    /// the summary page the portal answers with.
    pub async fn query(&self, uri: &str, options: QueryOptions) -> Result<PulseResponse> {
        let result = self.session.query(uri, options).await;
        self.apply_login_summary().await;
        result
    }

    async fn apply_login_summary(&self) {
        if let Some(summary) = self.session.take_login_summary().await {
            debug!("Applying summary page from session re-login");
            self.apply_summary(&summary).await;
        }
    }

    /// Poll the sync endpoint.
    ///
    /// Returns true when the token changed or the response was malformed (in
    /// which case the session is flagged for re-authentication).
    pub async fn updates_exist(&self) -> Result<bool> {
        Ok(self.sync_check().await?.updates_exist())
    }

    /// Poll the sync endpoint, returning the full comparison result.
    pub async fn sync_check(&self) -> Result<SyncOutcome> {
        let result = self.session.sync_check().await;
        self.apply_login_summary().await;
        result
    }

    // --- Sites ---

    /// Get a snapshot of all sites.
    pub async fn sites(&self) -> Vec<Site> {
        self.sites.read().await.clone()
    }

    /// Get a specific site by ID.
    pub async fn site(&self, id: &str) -> Option<Site> {
        self.sites.read().await.iter().find(|s| s.id == id).cloned()
    }

    async fn site_ids(&self) -> Vec<String> {
        self.sites.read().await.iter().map(|s| s.id.clone()).collect()
    }

    async fn apply_summary(&self, summary: &str) {
        let mut sites = self.sites.write().await;

        if sites.is_empty() {
            let Some(info) = parse_site_info(summary) else {
                warn!("No site found on the ADT Pulse summary page");
                return;
            };
            let mut site = Site::new(info.id, info.name);
            // Initial status; no change event
            site.update_alarm_status(summary);
            info!("Discovered site {} ({}), alarm {}", site.name, site.id, site.status);
            sites.push(site);
            let _ = self
                .event_tx
                .send(PulseEvent::SitesDiscovered { count: sites.len() });
            return;
        }

        if sites.len() > 1 {
            error!("Multiple sites are not supported; updating alarm status from the active site only");
        }

        for site in sites.iter_mut() {
            if let Some((old_status, new_status)) = site.update_alarm_status(summary) {
                let _ = self.event_tx.send(PulseEvent::AlarmStatusChanged {
                    site_id: site.id.clone(),
                    old_status,
                    new_status,
                });
            }
        }
    }

    // --- Zones ---

    /// Zones of a site, fetched from the portal if none are cached yet.
    pub async fn zones(&self, site_id: &str) -> Result<Vec<Zone>> {
        let site = self
            .site(site_id)
            .await
            .ok_or_else(|| PulseError::UnknownSite { id: site_id.to_string() })?;
        if !site.zones.is_empty() {
            return Ok(site.zones);
        }
        self.fetch_zones(site_id).await
    }

    /// Fetch zones for a site from the portal and replace the cached list.
    pub async fn fetch_zones(&self, site_id: &str) -> Result<Vec<Zone>> {
        if self.site(site_id).await.is_none() {
            return Err(PulseError::UnknownSite { id: site_id.to_string() });
        }

        let response = self
            .query(Endpoint::Zones.uri(), QueryOptions::get())
            .await?;
        ensure_success(Endpoint::Zones, &response)?;
        let zones = parse_zones_str(&response.body)?;
        debug!("Fetched {} zones for site {}", zones.len(), site_id);

        let mut sites = self.sites.write().await;
        let site = sites
            .iter_mut()
            .find(|s| s.id == site_id)
            .ok_or_else(|| PulseError::UnknownSite { id: site_id.to_string() })?;

        let changes = site.set_zones(zones.clone());
        let _ = self.event_tx.send(PulseEvent::ZonesUpdated {
            site_id: site_id.to_string(),
            count: zones.len(),
        });
        for change in changes {
            let _ = self.event_tx.send(PulseEvent::ZoneStatusChanged {
                site_id: site_id.to_string(),
                zone_id: change.zone_id,
                old_status: change.old_status,
                new_status: change.new_status,
            });
        }

        Ok(zones)
    }

    // --- Commands ---

    /// Set a site's alarm mode.
    ///
    /// The cached status only changes once the portal accepts the request.
    pub async fn arm(&self, site_id: &str, mode: ArmMode) -> Result<()> {
        let current = self
            .site(site_id)
            .await
            .ok_or_else(|| PulseError::UnknownSite { id: site_id.to_string() })?
            .status;

        debug!("Setting ADT Pulse alarm {} to {} (currently {})", site_id, mode, current);
        let response = self
            .query(
                Endpoint::ArmDisarm.uri(),
                QueryOptions::post().params(arm_form(current, mode)),
            )
            .await?;
        ensure_success(Endpoint::ArmDisarm, &response)?;

        let mut sites = self.sites.write().await;
        if let Some(site) = sites.iter_mut().find(|s| s.id == site_id)
            && let Some((old_status, new_status)) = site.set_status(AlarmStatus::from(mode))
        {
            let _ = self.event_tx.send(PulseEvent::AlarmStatusChanged {
                site_id: site_id.to_string(),
                old_status,
                new_status,
            });
        }
        Ok(())
    }

    pub async fn arm_away(&self, site_id: &str) -> Result<()> {
        self.arm(site_id, ArmMode::Away).await
    }

    pub async fn arm_home(&self, site_id: &str) -> Result<()> {
        self.arm(site_id, ArmMode::Home).await
    }

    pub async fn disarm(&self, site_id: &str) -> Result<()> {
        self.arm(site_id, ArmMode::Off).await
    }
}

fn ensure_success(endpoint: Endpoint, response: &PulseResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(PulseError::RequestFailed {
        uri: endpoint.uri().to_string(),
        status: response.status.as_u16(),
    })
}
