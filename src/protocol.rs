// MIT License - Copyright (c) 2026 Peter Wright
// Portal endpoints and request/response helpers

use std::sync::LazyLock;

use regex::Regex;
use reqwest::StatusCode;
use url::Url;

use crate::constants::{
    API_PREFIX, ARM_DISARM_URI, ARM_STATE_HREF, LOGIN_URI, LOGOUT_URI, SIGNED_OUT_MARKER,
    SUMMARY_URI, SYNC_CHECK_URI, ZONES_URI,
};
use crate::config::ArmMode;
use crate::devices::site::AlarmStatus;
use crate::error::Result;

/// HTTP method used for a portal query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Portal pages and AJAX endpoints the client talks to.
///
/// Every path is relative to `/myhome/<version>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST /access/signin.jsp`: form login, answers with the summary page.
    Login,
    /// `GET /access/signout.jsp`
    Logout,
    /// `GET /summary/summary.jsp`: summary page carrying the alarm orb.
    Summary,
    /// `GET /ajax/homeViewDevAjax.jsp`: JSON list of zone devices.
    Zones,
    /// `GET /Ajax/SyncCheckServ?ts=<ms>`: returns a `N-N-N` version token.
    SyncCheck,
    /// `POST /quickcontrol/armDisarm.jsp`
    ArmDisarm,
}

impl Endpoint {
    pub fn uri(&self) -> &'static str {
        match self {
            Endpoint::Login => LOGIN_URI,
            Endpoint::Logout => LOGOUT_URI,
            Endpoint::Summary => SUMMARY_URI,
            Endpoint::Zones => ZONES_URI,
            Endpoint::SyncCheck => SYNC_CHECK_URI,
            Endpoint::ArmDisarm => ARM_DISARM_URI,
        }
    }
}

/// Per-query options; `QueryOptions::get()` / `QueryOptions::post()` cover the common cases.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub method: Method,
    /// Query string for GET, form body for POST
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Overrides the configured attempt count
    pub retries: Option<u32>,
    /// Log in first when the session is not connected
    pub force_login: bool,
    /// Prefix the URI with `/myhome/<version>`
    pub version_prefix: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            method: Method::Get,
            params: Vec::new(),
            headers: Vec::new(),
            retries: None,
            force_login: true,
            version_prefix: true,
        }
    }
}

impl QueryOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::Post,
            ..Self::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn force_login(mut self, force: bool) -> Self {
        self.force_login = force;
        self
    }

    pub fn version_prefix(mut self, prefix: bool) -> Self {
        self.version_prefix = prefix;
        self
    }
}

/// A fully-read portal response.
#[derive(Debug, Clone)]
pub struct PulseResponse {
    pub status: StatusCode,
    /// Final URL after redirects
    pub url: Url,
    pub body: String,
}

impl PulseResponse {
    /// The portal signals success with a plain 200; other 2xx codes are treated as failures.
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Build the absolute URL for a portal URI.
///
/// e.g. `("https://portal.adtpulse.com", "16.0.0-131", "/access/signin.jsp", true)`
/// → `https://portal.adtpulse.com/myhome/16.0.0-131/access/signin.jsp`
pub fn build_url(host: &str, version: &str, uri: &str, version_prefix: bool) -> Result<Url> {
    let host = host.trim_end_matches('/');
    let raw = if version_prefix {
        format!("{host}{API_PREFIX}{version}{uri}")
    } else {
        format!("{host}{uri}")
    };
    Ok(Url::parse(&raw)?)
}

static VERSION_IN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/myhome/(.+)/access").expect("valid version pattern"));

/// Extract the portal version from a redirect target such as
/// `https://portal.adtpulse.com/myhome/16.0.0-131/access/signin.jsp`.
pub fn parse_version_from_url(url: &str) -> Option<String> {
    VERSION_IN_URL
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether a page body is the portal's "signed out due to inactivity" notice.
pub fn is_signed_out(body: &str) -> bool {
    body.contains(SIGNED_OUT_MARKER)
}

/// Form fields for the arm/disarm quick control: the state the site is in now and the one requested.
pub fn arm_form(current: AlarmStatus, mode: ArmMode) -> Vec<(String, String)> {
    vec![
        ("href".to_string(), ARM_STATE_HREF.to_string()),
        ("armstate".to_string(), current.as_str().to_string()),
        ("arm".to_string(), mode.as_str().to_string()),
    ]
}
