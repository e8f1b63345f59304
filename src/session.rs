// MIT License - Copyright (c) 2026 Peter Wright
// Portal session: login, retrying queries and sync checks

use std::time::{Duration, Instant};

use reqwest::header::USER_AGENT;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::PulseConfig;
use crate::constants::{DEFAULT_API_VERSION, FORM_PASSWORD, FORM_SUN, FORM_USERNAME};
use crate::error::{PulseError, Result};
use crate::event::{EventSender, PulseEvent};
use crate::protocol::{
    build_url, is_signed_out, parse_version_from_url, Endpoint, Method, PulseResponse,
    QueryOptions,
};
use crate::scrape::parse_login_error;
use crate::sync::{SyncOutcome, SyncTracker};

struct SessionState {
    authenticated: bool,
    authenticated_at: Option<Instant>,
    api_version: Option<String>,
    sync: SyncTracker,
    // Summary page from a login made inside `query`, not yet applied to sites
    login_summary: Option<String>,
}

/// Cookie-bearing session with the portal.
///
/// Handles form login, lazy re-authentication, the retrying query wrapper
/// and the sync-token poll. Site and zone state live in
/// [`PulseClient`](crate::client::PulseClient).
pub struct PulseSession {
    config: PulseConfig,
    http: reqwest::Client,
    state: Mutex<SessionState>,
    login_lock: Mutex<()>,
    event_tx: EventSender,
}

impl PulseSession {
    pub fn new(config: PulseConfig, event_tx: EventSender) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        let state = SessionState {
            authenticated: false,
            authenticated_at: None,
            api_version: config.api_version.clone(),
            sync: SyncTracker::new(),
            login_summary: None,
        };

        Ok(Self {
            config,
            http,
            state: Mutex::new(state),
            login_lock: Mutex::new(()),
            event_tx,
        })
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Portal version used in every path, detected once from the host's redirect.
    ///
    /// Falls back to the default version when the redirect carries none.
    pub async fn version(&self) -> Result<String> {
        if let Some(version) = self.state.lock().await.api_version.clone() {
            return Ok(version);
        }

        let response = self
            .http
            .get(&self.config.host)
            .header(USER_AGENT, &self.config.user_agent)
            .send()
            .await?;

        let version = match parse_version_from_url(response.url().as_str()) {
            Some(v) => {
                debug!("Discovered ADT Pulse version {}", v);
                v
            }
            None => {
                warn!(
                    "Couldn't auto-detect ADT Pulse version, defaulting to {}",
                    DEFAULT_API_VERSION
                );
                DEFAULT_API_VERSION.to_string()
            }
        };

        self.state.lock().await.api_version = Some(version.clone());
        Ok(version)
    }

    /// Whether the session is authenticated and not older than the relogin interval.
    pub async fn is_connected(&self) -> bool {
        let state = self.state.lock().await;
        if !state.authenticated {
            return false;
        }
        match (self.config.relogin_interval_secs, state.authenticated_at) {
            (Some(max_age), Some(at)) => at.elapsed() < Duration::from_secs(max_age),
            _ => true,
        }
    }

    /// Time of the last successful login.
    pub async fn authenticated_at(&self) -> Option<Instant> {
        self.state.lock().await.authenticated_at
    }

    /// Flag the session as logged out; the next forcing query logs in again.
    pub async fn set_logged_out(&self) {
        self.state.lock().await.authenticated = false;
    }

    pub async fn sync_token(&self) -> String {
        self.state.lock().await.sync.token().to_string()
    }

    /// Take the summary page returned by the last re-login `query` made on its own.
    ///
    /// Each summary is handed out once.
    pub async fn take_login_summary(&self) -> Option<String> {
        self.state.lock().await.login_summary.take()
    }

    /// Log in with the configured credentials.
    ///
    /// Returns the summary page the portal answers with.
    pub async fn login(&self) -> Result<String> {
        let _guard = self.login_lock.lock().await;
        self.login_locked().await
    }

    /// Log in unless another caller already did while this one waited on the lock.
    async fn ensure_logged_in(&self) -> Result<()> {
        let _guard = self.login_lock.lock().await;
        if self.is_connected().await {
            debug!("Session re-authenticated by another request");
            return Ok(());
        }
        let summary = self.login_locked().await?;
        self.state.lock().await.login_summary = Some(summary);
        Ok(())
    }

    // Caller holds `login_lock`
    async fn login_locked(&self) -> Result<String> {
        self.set_logged_out().await;

        let options = QueryOptions::post()
            .params([
                (FORM_USERNAME, self.config.username.as_str()),
                (FORM_PASSWORD, self.config.password.as_str()),
                (FORM_SUN, "yes"),
            ])
            .force_login(false);
        let response = self.send_with_retry(Endpoint::Login.uri(), &options).await?;

        if let Some(message) = parse_login_error(&response.body) {
            error!("ADT Pulse response: {}", message);
            return Err(PulseError::AuthenticationFailed { message });
        }
        if !response.is_success() {
            return Err(PulseError::RequestFailed {
                uri: Endpoint::Login.uri().to_string(),
                status: response.status.as_u16(),
            });
        }

        {
            let mut state = self.state.lock().await;
            state.authenticated = true;
            state.authenticated_at = Some(Instant::now());
            state.login_summary = None;
        }
        info!("Authenticated ADT Pulse account {}", self.config.username);
        let _ = self.event_tx.send(PulseEvent::Authenticated);

        Ok(response.body)
    }

    /// Log out of the portal. The session is flagged logged out even if the request fails.
    pub async fn logout(&self) -> Result<()> {
        info!("Logging {} out of ADT Pulse", self.config.username);
        let result = self
            .query(Endpoint::Logout.uri(), QueryOptions::get().force_login(false))
            .await;
        self.set_logged_out().await;
        let _ = self.event_tx.send(PulseEvent::LoggedOut);
        result.map(|_| ())
    }

    /// Issue a request against the portal.
    ///
    /// Logs in first when `force_login` is set and the session is not
    /// connected. Non-200 responses are retried up to the attempt count; once
    /// attempts run out the last response is returned as-is. A page saying the
    /// session lapsed triggers one re-login and a fresh round of attempts.
    pub async fn query(&self, uri: &str, options: QueryOptions) -> Result<PulseResponse> {
        if options.force_login && !self.is_connected().await {
            self.ensure_logged_in().await?;
        }

        let response = self.send_with_retry(uri, &options).await?;

        if options.force_login && response.is_success() && is_signed_out(&response.body) {
            warn!("Portal signed the session out; re-authenticating");
            self.ensure_logged_in().await?;
            return self.send_with_retry(uri, &options).await;
        }

        Ok(response)
    }

    /// Poll the sync endpoint and compare its token with the stored one.
    pub async fn sync_check(&self) -> Result<SyncOutcome> {
        let ts = self.state.lock().await.sync.next_timestamp();
        let response = self
            .query(
                Endpoint::SyncCheck.uri(),
                QueryOptions::get().param("ts", ts.to_string()),
            )
            .await?;

        let outcome = self.state.lock().await.sync.observe(&response.body);
        match &outcome {
            SyncOutcome::Malformed => {
                warn!(
                    "Sync check didn't match expected format, forcing re-authentication and notifying of updates"
                );
                self.set_logged_out().await;
            }
            SyncOutcome::Changed { previous, token } => {
                debug!("Sync token {} != existing {}; updates may exist", token, previous);
                let _ = self.event_tx.send(PulseEvent::UpdatesAvailable {
                    token: token.clone(),
                });
            }
            SyncOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    /// Whether the portal has state the caller has not fetched yet.
    pub async fn updates_exist(&self) -> Result<bool> {
        Ok(self.sync_check().await?.updates_exist())
    }

    async fn send_with_retry(&self, uri: &str, options: &QueryOptions) -> Result<PulseResponse> {
        let version = if options.version_prefix {
            self.version().await?
        } else {
            String::new()
        };
        let url = build_url(&self.config.host, &version, uri, options.version_prefix)?;
        let retries = options
            .retries
            .map_or(self.config.effective_retries(), |r| r.max(1));

        let mut last_response = None;
        let mut last_error = None;

        for attempt in 1..=retries {
            debug!(
                "Attempting {} {} (try {}/{})",
                options.method.as_str(),
                url,
                attempt,
                retries
            );

            match self.send_once(&url, options).await {
                Ok(response) if response.is_success() => {
                    if is_signed_out(&response.body) {
                        self.set_logged_out().await;
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    debug!("{} {} returned HTTP {}", options.method.as_str(), url, response.status);
                    last_response = Some(response);
                }
                Err(e) => {
                    warn!("{} {} failed: {}", options.method.as_str(), url, e);
                    last_error = Some(e);
                }
            }

            if attempt < retries && self.config.retry_delay_ms > 0 {
                sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }

        if let Some(response) = last_response {
            warn!(
                "Giving up on {} after {} attempts (last HTTP {})",
                url, retries, response.status
            );
            return Ok(response);
        }
        Err(last_error.unwrap_or(PulseError::NotConnected))
    }

    async fn send_once(&self, url: &Url, options: &QueryOptions) -> Result<PulseResponse> {
        let mut request = match options.method {
            Method::Get => self.http.get(url.clone()).query(&options.params),
            Method::Post => self.http.post(url.clone()).form(&options.params),
        };
        request = request.header(USER_AGENT, &self.config.user_agent);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;

        Ok(PulseResponse { status, url, body })
    }
}
