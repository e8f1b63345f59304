// MIT License - Copyright (c) 2026 Peter Wright
// Scraping of portal HTML pages and zone JSON

//! The portal has no documented API: state is read out of the HTML pages it
//! renders for browsers and out of the JSON its own scripts poll. Everything
//! here is tied to what the portal emits today and returns `None` (or an
//! empty list) rather than failing when an element is missing.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::constants::{
    ALARM_ORB_ATTR, ALARM_ORB_SELECTOR, DROPPED_ZONE_FIELDS, LOGIN_ERROR_SELECTOR,
    SIGNOUT_LINK_SELECTOR, SINGLE_PREMISE_SELECTOR,
};
use crate::devices::site::AlarmStatus;
use crate::devices::zone::Zone;
use crate::error::{PulseError, Result};

static LOGIN_ERROR: LazyLock<Selector> = LazyLock::new(|| selector(LOGIN_ERROR_SELECTOR));
static ALARM_ORB: LazyLock<Selector> = LazyLock::new(|| selector(ALARM_ORB_SELECTOR));
static SINGLE_PREMISE: LazyLock<Selector> = LazyLock::new(|| selector(SINGLE_PREMISE_SELECTOR));
static SIGNOUT_LINK: LazyLock<Selector> = LazyLock::new(|| selector(SIGNOUT_LINK_SELECTOR));

static NETWORK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"networkid=([^&]+)&").expect("valid network id pattern"));

// e.g. "Front Door - Closed\nLast Activity: 1/27 9:48 PM"
static ZONE_STATUS_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" - (.*)\n").expect("valid zone status pattern"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid CSS selector")
}

fn element_text<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Identity of the single premise shown on the summary page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    pub id: String,
    pub name: String,
}

/// Error message shown by the portal after a rejected login, if any.
pub fn parse_login_error(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let message = element_text(doc.select(&LOGIN_ERROR).next()?.text());
    if message.is_empty() {
        debug!("Login page carries an empty warning block");
        return None;
    }
    Some(message)
}

/// Alarm status from the `orb` attribute of the summary page's status canvas.
pub fn parse_alarm_status(html: &str) -> Option<AlarmStatus> {
    let doc = Html::parse_document(html);
    let orb = doc.select(&ALARM_ORB).next()?.value().attr(ALARM_ORB_ATTR)?;
    Some(AlarmStatus::from_orb(orb))
}

/// Site id and name from the summary page.
///
/// The name is the single-premise label; the id is the `networkid` carried by
/// the sign-out link. Accounts with several premises render a selector instead
/// of the label and are not supported.
pub fn parse_site_info(html: &str) -> Option<SiteInfo> {
    let doc = Html::parse_document(html);

    let Some(premise) = doc.select(&SINGLE_PREMISE).next() else {
        error!("Accounts with multiple sites are not supported");
        return None;
    };
    let name = element_text(premise.text());

    let Some(href) = doc
        .select(&SIGNOUT_LINK)
        .next()
        .and_then(|link| link.value().attr("href"))
    else {
        warn!("No sign-out link on summary page; cannot determine site id");
        return None;
    };

    match NETWORK_ID.captures(href).and_then(|c| c.get(1)) {
        Some(id) => {
            debug!("Discovered site id {}: {}", id.as_str(), name);
            Some(SiteInfo {
                id: id.as_str().to_string(),
                name,
            })
        }
        None => {
            warn!("Couldn't find site id in {}", href);
            None
        }
    }
}

/// Flatten the zone device list returned by the zones endpoint.
///
/// Expects `{"items": [...]}`. Non-object items are skipped.
pub fn parse_zones(payload: &Value) -> Result<Vec<Zone>> {
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| PulseError::InvalidResponse {
            details: "zone list has no items array".to_string(),
        })?;

    let zones = items
        .iter()
        .filter_map(|item| match item.as_object() {
            Some(obj) => Some(flatten_zone(obj.clone())),
            None => {
                warn!("Skipping malformed zone entry: {}", item);
                None
            }
        })
        .collect::<Vec<_>>();

    debug!("Parsed {} zones", zones.len());
    Ok(zones)
}

/// Parse the zones endpoint body.
pub fn parse_zones_str(body: &str) -> Result<Vec<Zone>> {
    let payload: Value = serde_json::from_str(body)?;
    parse_zones(&payload)
}

fn flatten_zone(mut item: Map<String, Value>) -> Zone {
    for field in DROPPED_ZONE_FIELDS {
        item.remove(field);
    }

    let state = item.remove("state");
    let status_txt = state
        .as_ref()
        .and_then(|s| s.get("statusTxt"))
        .and_then(Value::as_str);
    let activity_ts = state
        .as_ref()
        .and_then(|s| s.get("activityTs"))
        .and_then(value_as_i64)
        .unwrap_or(0);

    // The status pulled out of statusTxt replaces any top-level status.
    let existing_status = item.remove("status").and_then(|v| v.as_str().map(str::to_string));
    let status = status_txt.and_then(extract_status).or(existing_status);

    let tags = match item.remove("tags") {
        Some(Value::String(s)) => split_tags(&s),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let id = take_string(&mut item, "id");
    let name = take_string(&mut item, "name");

    Zone {
        id,
        name,
        tags,
        status,
        activity_ts,
        extra: item,
    }
}

/// Status phrase from a zone's `statusTxt`, e.g. `Closed` out of
/// `"Front Door - Closed\nLast Activity: ..."`.
pub fn extract_status(status_txt: &str) -> Option<String> {
    ZONE_STATUS_TEXT
        .captures(status_txt)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn take_string(item: &mut Map<String, Value>, key: &str) -> String {
    match item.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
