//! Token authorization middleware.
//!
//! For every request:
//!
//! 1. Classify the path against the protected-path set
//! 2. Resolve the client IP
//! 3. Unprotected: forward with `user_ip` only
//! 4. Protected: validate the bearer token downstream, then forward with
//!    `user_id` + `user_ip` or answer with an envelope
//!
//! # Token Extraction
//!
//! The token is the `Authorization` header value with an optional `Bearer `
//! prefix removed. A missing header is sent as an empty token and left for
//! the auth service to reject.
//!
//! # Example
//!
//! ```rust,ignore
//! let layer = AuthorizationLayer::new(
//!     ProtectedPaths::new(vec!["/api/**".into()]),
//!     Arc::new(AuthClient::from_config(&config)?),
//! );
//! let router = router.layer(layer);
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::info;
use uuid::Uuid;

use super::ip::resolve_client_ip;
use super::outcome::{ForwardHeaders, Outcome, normalize, with_headers};
use super::path_match::ProtectedPaths;
use crate::auth_client::TokenValidator;
use crate::metrics;

/// Scheme prefix stripped from the `Authorization` header.
const BEARER_PREFIX: &str = "Bearer ";

/// Header carrying the request id set by the pipeline.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Token authorization layer.
#[derive(Clone)]
pub struct AuthorizationLayer {
    protected: ProtectedPaths,
    validator: Arc<dyn TokenValidator>,
}

impl AuthorizationLayer {
    /// Create the layer.
    ///
    /// # Arguments
    ///
    /// * `protected` - Patterns of routes that require a token
    /// * `validator` - Downstream token validator
    pub fn new(protected: ProtectedPaths, validator: Arc<dyn TokenValidator>) -> Self {
        Self {
            protected,
            validator,
        }
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationService {
            inner,
            protected: self.protected.clone(),
            validator: self.validator.clone(),
        }
    }
}

/// Token authorization service wrapper.
#[derive(Clone)]
pub struct AuthorizationService<S> {
    inner: S,
    protected: ProtectedPaths,
    validator: Arc<dyn TokenValidator>,
}

impl<S> Service<Request<Body>> for AuthorizationService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let protected = self.protected.clone();
        let validator = self.validator.clone();
        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let needs_auth = protected.needs_auth(req.uri().path());
            let client_ip = resolve_client_ip(&req).into_owned();
            info!(
                client_ip = %client_ip,
                path = %req.uri().path(),
                needs_auth,
                "Authorization check"
            );

            if !needs_auth {
                metrics::record_auth_decision("bypass");
                let req = with_headers(req, &ForwardHeaders::ip_only(client_ip));
                return inner.call(req).await;
            }

            let token = extract_token(&req);
            // Normally set by the pipeline; mint one when the layer runs standalone
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

            let result = validator.validate_token(&token, Some(&request_id)).await;
            let outcome = normalize(result, &client_ip);
            metrics::record_auth_decision(outcome.label());

            match outcome {
                Outcome::Forward(headers) => inner.call(with_headers(req, &headers)).await,
                Outcome::Reject(rejection) => Ok(rejection.into_response()),
            }
        })
    }
}

/// Extract the bearer token from the `Authorization` header.
fn extract_token<B>(req: &Request<B>) -> String {
    let raw = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim();

    raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw).trim().to_string()
}
