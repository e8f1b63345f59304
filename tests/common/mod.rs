// MIT License - Copyright (c) 2026 Peter Wright
// Mock ADT Pulse portal for integration tests

#![allow(dead_code)]

use adt_pulse::constants::{LOGIN_URI, SUMMARY_URI, ZONES_URI};
use adt_pulse::PulseConfig;
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const VERSION: &str = "16.0.0-131";
pub const SITE_ID: &str = "150616za043597";
pub const USERNAME: &str = "owner@example.com";
pub const PASSWORD: &str = "hunter2";

/// Versioned path for a portal URI, e.g. `/myhome/16.0.0-131/access/signin.jsp`.
pub fn versioned(uri: &str) -> String {
    format!("/myhome/{VERSION}{uri}")
}

/// Client config pointed at the mock with the version pinned and no connect backoff.
pub fn config(server: &MockServer) -> PulseConfig {
    PulseConfig::builder()
        .username(USERNAME)
        .password(PASSWORD)
        .host(server.uri())
        .api_version(VERSION)
        .fetch_zones_on_login(false)
        .max_connect_retries(0)
        .reconnect_delay_ms(0)
        .build()
}

pub fn summary_html(orb: &str) -> String {
    format!(
        r#"<html><body>
  <div id="p_header">
    <span id="p_singlePremise">Lake House</span>
    <a id="p_signout1" class="p_signoutlink"
       href="/myhome/{VERSION}/access/signout.jsp?networkid={SITE_ID}&partner=adt">Sign Out</a>
  </div>
  <canvas id="ic_orb" orb="{orb}" width="120" height="120"></canvas>
</body></html>"#
    )
}

pub const LOGIN_ERROR_HTML: &str = r#"<html><body>
  <div id="warnMsgContents" class="p_signinWarn">Sign In unsuccessful. Your username or password is incorrect.</div>
</body></html>"#;

pub const SIGNED_OUT_HTML: &str = r#"<html><body>
  <div class="p_signinWarn">You have not yet signed in or you have been signed out due to inactivity.</div>
</body></html>"#;

pub fn zones_json(door_status: &str) -> Value {
    json!({
        "items": [
            {
                "id": "sensor-1",
                "name": "Front Door",
                "tags": "sensor,doorWindow",
                "deprecatedAction": "checkDevice(1)",
                "devIndex": "E1VER1",
                "state": {
                    "icon": "devStatOK",
                    "statusTxt": format!("Front Door - {door_status}\nLast Activity: 1/27 9:48 PM"),
                    "activityTs": 1611805733000_i64
                }
            },
            {
                "id": "sensor-2",
                "name": "Hall Motion",
                "tags": "sensor,motion",
                "deprecatedAction": "checkDevice(2)",
                "devIndex": "E2VER1",
                "state": {
                    "icon": "devStatOK",
                    "statusTxt": "Hall Motion - No Motion\nLast Activity: 1/27 8:02 PM",
                    "activityTs": 1611802920000_i64
                }
            }
        ]
    })
}

/// Login accepted, answering with the summary page.
pub async fn mount_login(server: &MockServer, orb: &str) {
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html(orb)))
        .mount(server)
        .await;
}

pub async fn mount_summary(server: &MockServer, orb: &str) {
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html(orb)))
        .mount(server)
        .await;
}

pub async fn mount_zones(server: &MockServer, door_status: &str) {
    Mock::given(method("GET"))
        .and(path(versioned(ZONES_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_json(zones_json(door_status)))
        .mount(server)
        .await;
}
