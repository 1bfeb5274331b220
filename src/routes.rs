//! Application routing and the request pipeline.
//!
//! # Pipeline (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Catch Panic    │ ← 500 envelope for anything that panics below
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Sets/propagates x-request-id
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response spans
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │      CORS        │ ← Cross-origin headers
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Body Limit     │
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Authorization   │ ← Token check, user_id/user_ip injection
//! └────────┬─────────┘
//!          ▼
//!  /health | forward upstream
//! ```
//!
//! The order is declared once in [`PIPELINE_ORDER`] and [`build_router`]
//! applies the stages by walking it.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::panic_response;
use crate::handlers;
use crate::middleware::AuthorizationLayer;
use crate::proxy;
use crate::state::AppState;

/// One stage of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CatchPanic,
    RequestId,
    Trace,
    Cors,
    BodyLimit,
    Authorization,
}

/// Pipeline stages, outermost first.
pub const PIPELINE_ORDER: [Stage; 6] = [
    Stage::CatchPanic,
    Stage::RequestId,
    Stage::Trace,
    Stage::Cors,
    Stage::BodyLimit,
    Stage::Authorization,
];

/// Build the gateway router with every pipeline stage applied.
///
/// `/health` is served locally; every other request falls through to the
/// upstream forwarder once the pipeline approves it.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .fallback(proxy::forward);

    // Layers wrap what is already there, so apply innermost first
    for stage in PIPELINE_ORDER.iter().rev() {
        router = match stage {
            Stage::CatchPanic => router.layer(CatchPanicLayer::custom(panic_response)),
            Stage::RequestId => router
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)),
            Stage::Trace => router.layer(TraceLayer::new_for_http()),
            Stage::Cors => router.layer(build_cors_layer(&config.cors_allowed_origins)),
            Stage::BodyLimit => {
                info!(
                    max_size_mb = config.max_request_body_size / (1024 * 1024),
                    "Request body size limit configured"
                );
                router.layer(DefaultBodyLimit::max(config.max_request_body_size))
            }
            Stage::Authorization => {
                info!(
                    patterns = ?state.protected.patterns(),
                    "Token authorization enabled"
                );
                router.layer(AuthorizationLayer::new(
                    state.protected.clone(),
                    state.validator.clone(),
                ))
            }
        };
    }

    router.with_state(state)
}

/// Build CORS layer from configuration.
///
/// # Arguments
///
/// * `allowed_origins` - List of allowed origins, or `["*"]` for any origin
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allow_any {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::auth_client::{DownstreamAuthResult, TokenValidator};
    use crate::config::Config;

    struct Reject;

    #[async_trait]
    impl TokenValidator for Reject {
        async fn validate_token(&self, _: &str, _: Option<&str>) -> DownstreamAuthResult {
            DownstreamAuthResult::business(401, "token expired/invalid")
        }
    }

    fn router() -> Router {
        let state = AppState::new(Config::default(), Arc::new(Reject)).unwrap();
        build_router(state)
    }

    #[test]
    fn test_pipeline_order() {
        assert_eq!(PIPELINE_ORDER.first(), Some(&Stage::CatchPanic));
        assert_eq!(PIPELINE_ORDER.last(), Some(&Stage::Authorization));

        let unique: HashSet<_> = PIPELINE_ORDER.iter().collect();
        assert_eq!(unique.len(), PIPELINE_ORDER.len());
    }

    #[tokio::test]
    async fn test_health_is_served_locally_with_request_id() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_protected_route_rejected_before_forwarding() {
        let response = router()
            .oneshot(
                Request::get("/customer/web/test_auth")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], 401);
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_kept() {
        let response = router()
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-123");
    }

    #[test]
    fn test_build_cors_layer_variants() {
        let _any = build_cors_layer(&["*".to_string()]);
        let _specific = build_cors_layer(&[
            "https://example.com".to_string(),
            "https://app.example.com".to_string(),
        ]);
    }
}
