#![allow(clippy::unwrap_used)]
// Integration tests for `ChargerClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eveus_api::{ChargerClient, ChargerState, Error, TelemetryValue, TransportConfig, fields};

// ── Helpers ─────────────────────────────────────────────────────────

/// `admin:secret`, base64-encoded.
const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

fn client_for(uri: &str, transport: TransportConfig) -> ChargerClient {
    let secret: secrecy::SecretString = "secret".to_string().into();
    ChargerClient::new(Url::parse(uri).unwrap(), "admin", secret, transport)
}

async fn setup() -> (MockServer, ChargerClient) {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), TransportConfig::default());
    (server, client)
}

// ── State endpoint ──────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_state_parses_telemetry() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/main"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": 4,
            "powerMeas": 7200.5,
            "currentSet": 16,
            "evseEnabled": 1,
            "verFWMain": " 3.0.2 ",
            "unused": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client.fetch_state().await.unwrap();

    assert_eq!(snapshot.len(), 5);
    assert_eq!(snapshot.charger_state(), Some(ChargerState::Charging));
    assert_eq!(snapshot.power_w(), Some(7200.5));
    assert_eq!(snapshot.get(fields::CURRENT_SET), Some(&TelemetryValue::Int(16)));
    assert_eq!(snapshot.bool(fields::ENABLED), Some(true));
    assert_eq!(
        snapshot.device_info().firmware_version.as_deref(),
        Some("3.0.2")
    );
    assert!(client.has_session());
}

#[tokio::test]
async fn test_fetch_state_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.fetch_state().await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_fetch_state_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.fetch_state().await.unwrap_err();

    assert!(matches!(err, Error::Status { status: 503, .. }), "got: {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_fetch_state_rejects_non_object_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2, 3]"))
        .mount(&server)
        .await;

    let result = client.fetch_state().await;

    match result {
        Err(Error::Protocol { body, .. }) => assert_eq!(body, "[1, 2, 3]"),
        other => panic!("expected Protocol error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_state_rejects_html_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client.fetch_state().await.unwrap_err();
    assert_eq!(err.error_type(), "ProtocolError");
}

#[tokio::test]
async fn test_fetch_state_timeout() {
    let server = MockServer::start().await;
    let client = client_for(
        &server.uri(),
        TransportConfig {
            timeout: Duration::from_millis(200),
            ..TransportConfig::default()
        },
    );

    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "state": 2 }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.fetch_state().await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_fetch_state_connection_refused() {
    let client = client_for("http://127.0.0.1:1", TransportConfig::default());

    let err = client.fetch_state().await.unwrap_err();

    assert!(matches!(err, Error::Connectivity { .. }), "got: {err:?}");
    assert_eq!(err.error_type(), "ConnectionError");
}

// ── Command endpoint ────────────────────────────────────────────────

#[tokio::test]
async fn test_dispatch_command_sends_form_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/pageEvent"))
        .and(header("authorization", BASIC_AUTH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("pageevent=currentSet&currentSet=16"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client.dispatch_command("currentSet", "16").await.unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_dispatch_command_error_marker() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/pageEvent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ERROR: value out of range"))
        .mount(&server)
        .await;

    let result = client.dispatch_command("currentSet", "99").await;

    match result {
        Err(Error::Command { command, response }) => {
            assert_eq!(command, "currentSet");
            assert_eq!(response, "ERROR: value out of range");
        }
        other => panic!("expected Command error, got: {other:?}"),
    }
}

// ── Session lifecycle ───────────────────────────────────────────────

#[tokio::test]
async fn test_reset_and_close_release_session() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": 2 })))
        .expect(2)
        .mount(&server)
        .await;

    assert!(!client.has_session());
    client.fetch_state().await.unwrap();
    assert!(client.has_session());

    client.reset_session();
    assert!(!client.has_session());

    // A fresh session is built on demand after a reset.
    client.fetch_state().await.unwrap();
    assert!(client.has_session());

    client.close().await;
    assert!(!client.has_session());
}
