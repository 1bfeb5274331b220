//! End-to-end tests of the gateway router.
//!
//! Two wiremock servers play the auth service and the upstream. Requests are
//! driven through the real router with `tower::ServiceExt::oneshot`.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use edge_gateway::{AppState, AuthClient, Config, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/user/auth_token";
const RETRY_LATER: &str = "service temporarily unavailable, retry later";

fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn gateway(auth_url: &str, upstream_url: &str) -> Router {
    let config = Config {
        upstream_url: upstream_url.to_string(),
        auth_service_url: auth_url.to_string(),
        auth_timeout: Duration::from_millis(300),
        protected_paths: vec!["/secure/**".to_string(), "/customer/*/profile".to_string()],
        ..Config::default()
    };
    config.validate().unwrap();

    let validator = AuthClient::from_config(&config).unwrap();
    let state = AppState::new(config, Arc::new(validator)).unwrap();
    build_router(state)
}

async fn mount_auth(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn verified_request_is_forwarded_with_identity() {
    let auth = MockServer::start().await;
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(query_param("token", "good-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 200, "msg": "ok", "data": "42"})),
        )
        .expect(1)
        .mount(&auth)
        .await;
    Mock::given(method("GET"))
        .and(path("/secure/orders"))
        .and(query_param("page", "2"))
        .and(header("user_id", "42"))
        .and(header("user_ip", "203.0.113.5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("orders"))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = gateway(&auth.uri(), &upstream.uri())
        .oneshot(
            Request::get("/secure/orders?page=2")
                .header("Authorization", "Bearer good-token")
                .header("X-Forwarded-For", "203.0.113.5:8080, 10.0.0.1")
                .header("user_id", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"orders");
}

#[tokio::test]
async fn rejected_token_returns_http_200_envelope() {
    let auth = MockServer::start().await;
    let upstream = MockServer::start().await;
    mount_auth(&auth, ResponseTemplate::new(401).set_body_string("expired")).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let response = gateway(&auth.uri(), &upstream.uri())
        .oneshot(
            Request::get("/secure/orders")
                .header("Authorization", "Bearer stale")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["code"], 401);
    assert_eq!(body["msg"], "token expired/invalid");
}

#[tokio::test]
async fn embedded_rejection_with_null_msg_uses_fallback_message() {
    let auth = MockServer::start().await;
    let upstream = MockServer::start().await;
    mount_auth(
        &auth,
        ResponseTemplate::new(200)
            .set_body_json(json!({"code": 401, "msg": null, "data": null, "timestamp": 1})),
    )
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let response = gateway(&auth.uri(), &upstream.uri())
        .oneshot(
            Request::get("/secure/orders")
                .header("Authorization", "Bearer t")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["code"], 401);
    assert_eq!(body["msg"], "auth service error");
}

#[tokio::test]
async fn auth_timeout_and_connect_failure_look_the_same() {
    let slow_auth = MockServer::start().await;
    mount_auth(
        &slow_auth,
        ResponseTemplate::new(200)
            .set_body_json(json!({"code": 200, "msg": "ok", "data": "42"}))
            .set_delay(Duration::from_secs(2)),
    )
    .await;
    let upstream = MockServer::start().await;

    let request = || {
        Request::get("/customer/web/profile")
            .header("Authorization", "Bearer t")
            .body(Body::empty())
            .unwrap()
    };

    let timed_out = gateway(&slow_auth.uri(), &upstream.uri())
        .oneshot(request())
        .await
        .unwrap();
    let refused = gateway(&dead_url(), &upstream.uri())
        .oneshot(request())
        .await
        .unwrap();

    assert_eq!(timed_out.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(refused.status(), StatusCode::SERVICE_UNAVAILABLE);

    let timed_out = read_json(timed_out).await;
    let refused = read_json(refused).await;
    assert_eq!(timed_out["code"], 503);
    assert_eq!(timed_out["msg"], RETRY_LATER);
    assert_eq!(timed_out["code"], refused["code"]);
    assert_eq!(timed_out["msg"], refused["msg"]);
}

#[tokio::test]
async fn malformed_auth_reply_is_500() {
    let auth = MockServer::start().await;
    mount_auth(&auth, ResponseTemplate::new(200).set_body_string("null")).await;
    let upstream = MockServer::start().await;

    let response = gateway(&auth.uri(), &upstream.uri())
        .oneshot(
            Request::get("/secure/x")
                .header("Authorization", "Bearer t")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["code"], 500);
    assert_eq!(body["msg"], "auth service error");
}

#[tokio::test]
async fn unprotected_request_skips_auth_and_gets_peer_ip() {
    let auth = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&auth)
        .await;

    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/public/ping"))
        .and(header("user_ip", "198.51.100.23"))
        .respond_with(ResponseTemplate::new(201).set_body_string("pong"))
        .expect(1)
        .mount(&upstream)
        .await;

    let mut request = Request::post("/public/ping")
        .header("user_id", "spoofed")
        .body(Body::from("ping"))
        .unwrap();
    let peer: SocketAddr = "198.51.100.23:50000".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));

    let response = gateway(&auth.uri(), &upstream.uri())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("user_id").is_none());
    assert_eq!(received[0].body, b"ping");
}

#[tokio::test]
async fn unreachable_upstream_is_503_envelope() {
    let auth = MockServer::start().await;

    let response = gateway(&auth.uri(), &dead_url())
        .oneshot(Request::get("/public/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json(response).await;
    assert_eq!(body["code"], 503);
    assert_eq!(body["msg"], RETRY_LATER);
}

#[tokio::test]
async fn health_is_answered_locally() {
    let auth = MockServer::start().await;

    let response = gateway(&auth.uri(), &dead_url())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
