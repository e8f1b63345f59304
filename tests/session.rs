// MIT License - Copyright (c) 2026 Peter Wright
// Session tests against a mock portal: login, retrying queries, sync checks

mod common;

use std::sync::Arc;
use std::time::Duration;

use adt_pulse::constants::{DEFAULT_API_VERSION, LOGIN_URI, LOGOUT_URI, SUMMARY_URI, SYNC_CHECK_URI};
use adt_pulse::event::event_channel;
use adt_pulse::{PulseConfig, PulseError, PulseEvent, PulseSession, QueryOptions, SyncOutcome};
use common::*;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn session(config: PulseConfig) -> PulseSession {
    let (tx, _rx) = event_channel(64);
    PulseSession::new(config, tx).unwrap()
}

#[tokio::test]
async fn query_surfaces_last_response_after_all_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(500).set_body_string("busy"))
        .expect(3)
        .mount(&server)
        .await;

    let s = session(config(&server));
    let response = s
        .query(SUMMARY_URI, QueryOptions::get().force_login(false))
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 500);
    assert_eq!(response.body, "busy");
    assert!(!response.is_success());
}

#[tokio::test]
async fn query_stops_retrying_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html("off")))
        .expect(1)
        .mount(&server)
        .await;

    let s = session(config(&server));
    let response = s
        .query(SUMMARY_URI, QueryOptions::get().force_login(false))
        .await
        .unwrap();

    assert!(response.is_success());
    assert!(response.url.path().ends_with(SUMMARY_URI));
}

#[tokio::test]
async fn query_with_zero_retries_makes_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let s = session(config(&server));
    let response = s
        .query(SUMMARY_URI, QueryOptions::get().force_login(false).retries(0))
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 404);
}

#[tokio::test]
async fn query_uses_configured_attempt_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.retries = 5;
    let s = session(config);
    let response = s
        .query(SUMMARY_URI, QueryOptions::get().force_login(false))
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 500);
}

#[tokio::test]
async fn query_options_override_attempt_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(502))
        .expect(5)
        .mount(&server)
        .await;

    let s = session(config(&server));
    let response = s
        .query(SUMMARY_URI, QueryOptions::get().force_login(false).retries(5))
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 502);
}

#[tokio::test]
async fn query_transport_error_when_no_response() {
    let server = MockServer::start().await;
    // Every attempt outlives the request timeout
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.retries = 2;
    config.request_timeout_ms = 100;
    let s = session(config);

    let err = s
        .query(SUMMARY_URI, QueryOptions::get().force_login(false))
        .await
        .unwrap_err();
    assert!(matches!(err, PulseError::Http(_)));
    assert!(err.is_retryable());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn login_posts_credentials_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .and(body_string_contains("usernameForm=owner%40example.com"))
        .and(body_string_contains("passwordForm=hunter2"))
        .and(body_string_contains("sun=yes"))
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html("away")))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, mut rx) = event_channel(16);
    let s = PulseSession::new(config(&server), tx).unwrap();

    let summary = s.login().await.unwrap();
    assert!(summary.contains("ic_orb"));
    assert!(s.is_connected().await);
    assert!(s.authenticated_at().await.is_some());
    assert_eq!(rx.try_recv().unwrap(), PulseEvent::Authenticated);
}

#[tokio::test]
async fn login_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_ERROR_HTML))
        .expect(1)
        .mount(&server)
        .await;

    let s = session(config(&server));
    let err = s.login().await.unwrap_err();

    match &err {
        PulseError::AuthenticationFailed { message } => {
            assert!(message.contains("username or password is incorrect"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retryable());
    assert!(!s.is_connected().await);
}

#[tokio::test]
async fn login_http_failure_is_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let s = session(config(&server));
    let err = s.login().await.unwrap_err();
    assert!(matches!(err, PulseError::RequestFailed { status: 502, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn query_logs_in_lazily_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html("off")))
        .expect(1)
        .mount(&server)
        .await;
    mount_summary(&server, "off").await;

    let s = session(config(&server));
    assert!(!s.is_connected().await);

    s.query(SUMMARY_URI, QueryOptions::get()).await.unwrap();
    s.query(SUMMARY_URI, QueryOptions::get()).await.unwrap();
    assert!(s.is_connected().await);
}

#[tokio::test]
async fn concurrent_queries_share_one_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(summary_html("off"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_summary(&server, "off").await;

    let s = Arc::new(session(config(&server)));
    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.query(SUMMARY_URI, QueryOptions::get()).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_success());
    }

    let logins = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .count();
    assert_eq!(logins, 1);
    assert!(s.is_connected().await);
}

#[tokio::test]
async fn lazy_login_keeps_summary_for_the_client() {
    let server = MockServer::start().await;
    mount_login(&server, "away").await;
    mount_summary(&server, "away").await;

    let s = session(config(&server));
    assert!(s.take_login_summary().await.is_none());

    s.query(SUMMARY_URI, QueryOptions::get()).await.unwrap();
    let summary = s.take_login_summary().await.unwrap();
    assert!(summary.contains(r#"orb="away""#));
    assert!(s.take_login_summary().await.is_none());

    // An explicit login hands its summary back directly
    s.login().await.unwrap();
    assert!(s.take_login_summary().await.is_none());
}

#[tokio::test]
async fn signed_out_page_triggers_relogin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html("off")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(SIGNED_OUT_HTML))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_summary(&server, "home").await;

    let s = session(config(&server));
    let response = s.query(SUMMARY_URI, QueryOptions::get()).await.unwrap();

    assert!(response.body.contains(r#"orb="home""#));
    assert!(s.is_connected().await);
}

#[tokio::test]
async fn user_agent_and_extra_headers_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(versioned(SUMMARY_URI)))
        .and(header("user-agent", "pulse-test/1.0"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = PulseConfig::builder()
        .host(server.uri())
        .api_version(VERSION)
        .user_agent("pulse-test/1.0")
        .build();
    let s = session(config);
    let response = s
        .query(
            SUMMARY_URI,
            QueryOptions::get()
                .force_login(false)
                .header("X-Requested-With", "XMLHttpRequest"),
        )
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn version_discovered_from_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/myhome/17.1.0-5/access/signin.jsp"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/myhome/17.1.0-5/access/signin.jsp"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/myhome/17.1.0-5/summary/summary.jsp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = PulseConfig::builder().host(server.uri()).build();
    let s = session(config);

    assert_eq!(s.version().await.unwrap(), "17.1.0-5");
    // Cached: no second discovery request
    assert_eq!(s.version().await.unwrap(), "17.1.0-5");

    let response = s
        .query(SUMMARY_URI, QueryOptions::get().force_login(false))
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn version_defaults_without_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let s = session(PulseConfig::builder().host(server.uri()).build());
    assert_eq!(s.version().await.unwrap(), DEFAULT_API_VERSION);
}

#[tokio::test]
async fn sync_check_reports_token_changes() {
    let server = MockServer::start().await;
    mount_login(&server, "off").await;
    Mock::given(method("GET"))
        .and(path(versioned(SYNC_CHECK_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string("1-0-0"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(versioned(SYNC_CHECK_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string("1-0-1\n"))
        .mount(&server)
        .await;

    let (tx, mut rx) = event_channel(16);
    let s = PulseSession::new(config(&server), tx).unwrap();

    assert_eq!(
        s.sync_check().await.unwrap(),
        SyncOutcome::Changed {
            previous: "0-0-0".to_string(),
            token: "1-0-0".to_string(),
        }
    );
    assert!(!s.updates_exist().await.unwrap());
    assert!(s.updates_exist().await.unwrap());
    assert_eq!(s.sync_token().await, "1-0-1");

    assert_eq!(rx.try_recv().unwrap(), PulseEvent::Authenticated);
    assert_eq!(
        rx.try_recv().unwrap(),
        PulseEvent::UpdatesAvailable { token: "1-0-0".to_string() }
    );
    assert_eq!(
        rx.try_recv().unwrap(),
        PulseEvent::UpdatesAvailable { token: "1-0-1".to_string() }
    );

    // Every sync check carries a strictly increasing ts parameter
    let requests = server.received_requests().await.unwrap();
    let stamps: Vec<i64> = requests
        .iter()
        .filter(|r| r.url.path() == versioned(SYNC_CHECK_URI))
        .map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "ts")
                .and_then(|(_, v)| v.parse().ok())
                .unwrap()
        })
        .collect();
    assert_eq!(stamps.len(), 3);
    assert!(stamps.windows(2).all(|w| w[1] > w[0]));
}

#[tokio::test]
async fn malformed_sync_response_forces_relogin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html("off")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(versioned(SYNC_CHECK_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(versioned(SYNC_CHECK_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string("0-0-0"))
        .mount(&server)
        .await;

    let s = session(config(&server));

    assert_eq!(s.sync_check().await.unwrap(), SyncOutcome::Malformed);
    assert!(!s.is_connected().await);
    assert_eq!(s.sync_token().await, "0-0-0");

    // Next check logs in again and finds nothing new
    assert!(!s.updates_exist().await.unwrap());
    assert!(s.is_connected().await);
}

#[tokio::test]
async fn logout_flags_session() {
    let server = MockServer::start().await;
    mount_login(&server, "off").await;
    Mock::given(method("GET"))
        .and(path(versioned(LOGOUT_URI)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, mut rx) = event_channel(16);
    let s = PulseSession::new(config(&server), tx).unwrap();
    s.login().await.unwrap();
    s.logout().await.unwrap();

    assert!(!s.is_connected().await);
    assert_eq!(rx.try_recv().unwrap(), PulseEvent::Authenticated);
    assert_eq!(rx.try_recv().unwrap(), PulseEvent::LoggedOut);
}

#[tokio::test]
async fn relogin_interval_expires_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(versioned(LOGIN_URI)))
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html("off")))
        .expect(2)
        .mount(&server)
        .await;
    mount_summary(&server, "off").await;

    let config = PulseConfig::builder()
        .username(USERNAME)
        .password(PASSWORD)
        .host(server.uri())
        .api_version(VERSION)
        .relogin_interval_secs(0)
        .build();
    let s = session(config);

    s.login().await.unwrap();
    // A zero interval makes every session stale straight away
    assert!(!s.is_connected().await);
    s.query(SUMMARY_URI, QueryOptions::get()).await.unwrap();
}
