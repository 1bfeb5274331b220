//! Integration tests for the auth service client.
//!
//! A wiremock `MockServer` stands in for the auth service so every branch of
//! the result taxonomy can be produced on demand.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::{Duration, Instant};

use edge_gateway::{AuthClient, DownstreamAuthResult, TokenValidator, TransportErrorKind};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/user/auth_token";

fn client(server: &MockServer, timeout: Duration) -> AuthClient {
    AuthClient::new(&format!("{}{TOKEN_PATH}", server.uri()), timeout).expect("auth client")
}

/// An address nothing is listening on.
fn dead_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}{TOKEN_PATH}")
}

#[tokio::test]
async fn success_envelope_yields_subject() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(query_param("token", "abc.def"))
        .and(header("x-request-id", "req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "msg": "ok",
            "data": "42",
            "timestamp": 1_718_000_000_000_i64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(3))
        .validate_token("abc.def", Some("req-1"))
        .await;

    assert_eq!(
        result,
        DownstreamAuthResult::Success {
            subject: "42".to_string()
        }
    );
}

#[tokio::test]
async fn token_is_url_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(query_param("token", "a b+c/=&d"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 200, "msg": "ok", "data": 7})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(3))
        .validate_token("a b+c/=&d", None)
        .await;

    assert_eq!(
        result,
        DownstreamAuthResult::Success {
            subject: "7".to_string()
        }
    );
}

#[tokio::test]
async fn embedded_business_error_keeps_envelope_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1008,
            "msg": "account locked",
            "data": null
        })))
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(3))
        .validate_token("t", None)
        .await;

    assert_eq!(result, DownstreamAuthResult::business(1008, "account locked"));
}

#[tokio::test]
async fn non_2xx_maps_status_to_message() {
    let cases = [
        (401, "token expired/invalid"),
        (400, "invalid token format"),
        (500, "auth service internal error"),
        (503, "auth service internal error"),
        (403, "auth service error"),
    ];

    for (status, message) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let result = client(&server, Duration::from_secs(3))
            .validate_token("t", None)
            .await;

        assert_eq!(
            result,
            DownstreamAuthResult::business(i32::from(status), message),
            "status {status}"
        );
    }
}

#[tokio::test]
async fn malformed_2xx_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(3))
        .validate_token("t", None)
        .await;

    assert_eq!(
        result,
        DownstreamAuthResult::TransportError(TransportErrorKind::MalformedResponse)
    );
}

#[tokio::test]
async fn slow_auth_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": 200, "msg": "ok", "data": "42"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = client(&server, Duration::from_millis(200))
        .validate_token("t", None)
        .await;

    assert_eq!(
        result,
        DownstreamAuthResult::TransportError(TransportErrorKind::Timeout)
    );
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn unreachable_auth_service_is_connect_refused() {
    let client = AuthClient::new(&dead_endpoint(), Duration::from_secs(3)).unwrap();

    let result = client.validate_token("t", None).await;

    assert_eq!(
        result,
        DownstreamAuthResult::TransportError(TransportErrorKind::ConnectRefused)
    );
}
