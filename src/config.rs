// MIT License - Copyright (c) 2026 Peter Wright
// Client configuration

use std::fmt;

use crate::constants::API_HOST;

/// Arm state requested through the portal's quick control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmMode {
    /// Full/away arm
    Away,
    /// Stay/home arm
    Home,
    /// Disarm
    Off,
}

impl ArmMode {
    /// The value the portal expects in the `arm` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Away => "away",
            Self::Home => "home",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for ArmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a portal session.
#[derive(Clone)]
pub struct PulseConfig {
    /// Portal account username
    pub username: String,
    /// Portal account password
    pub password: String,
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Portal base URL (scheme and host, no path)
    pub host: String,
    /// Pinned portal version; when unset the version is detected from the login redirect
    pub api_version: Option<String>,
    /// Attempts per query before the last response is surfaced (minimum 1)
    pub retries: u32,
    /// Pause between query attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum number of login retries on transient errors during connect (0 = no retries)
    pub max_connect_retries: u32,
    /// Reconnection delay in milliseconds (base delay for exponential backoff)
    pub reconnect_delay_ms: u64,
    /// Whether zones are fetched as part of every login
    pub fetch_zones_on_login: bool,
    /// Age after which an authenticated session is considered stale and re-established
    pub relogin_interval_secs: Option<u64>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            user_agent: format!("adt-pulse/{}", env!("CARGO_PKG_VERSION")),
            host: API_HOST.to_string(),
            api_version: None,
            retries: 3,
            retry_delay_ms: 0,
            request_timeout_ms: 30000,
            max_connect_retries: 3,
            reconnect_delay_ms: 10000,
            fetch_zones_on_login: true,
            relogin_interval_secs: None,
        }
    }
}

impl fmt::Debug for PulseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PulseConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("host", &self.host)
            .field("api_version", &self.api_version)
            .field("retries", &self.retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_connect_retries", &self.max_connect_retries)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("fetch_zones_on_login", &self.fetch_zones_on_login)
            .field("relogin_interval_secs", &self.relogin_interval_secs)
            .finish()
    }
}

impl PulseConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> PulseConfigBuilder {
        PulseConfigBuilder::default()
    }

    /// Query attempts actually made; a zero setting still sends the request once.
    pub fn effective_retries(&self) -> u32 {
        self.retries.max(1)
    }
}

/// Builder for PulseConfig.
#[derive(Debug, Clone, Default)]
pub struct PulseConfigBuilder {
    config: PulseConfig,
}

impl PulseConfigBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Trailing slashes are stripped so paths can be appended directly.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = Some(version.into());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn max_connect_retries(mut self, retries: u32) -> Self {
        self.config.max_connect_retries = retries;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn fetch_zones_on_login(mut self, fetch: bool) -> Self {
        self.config.fetch_zones_on_login = fetch;
        self
    }

    pub fn relogin_interval_secs(mut self, secs: u64) -> Self {
        self.config.relogin_interval_secs = Some(secs);
        self
    }

    pub fn build(self) -> PulseConfig {
        self.config
    }
}
