//! Client for the downstream token validation endpoint.
//!
//! ```text
//! GET <auth-service>/user/auth_token?token=<token>
//!   2xx → Envelope { code, msg, data: <user id> }
//!   else → best-effort text body
//! ```
//!
//! Every failure is converted into a [`DownstreamAuthResult`] here; nothing
//! reqwest-specific leaks past this module.
//!
//! # Timeouts & Retries
//!
//! The whole exchange (connect, request, body) is bounded by one hard
//! timeout. On expiry the in-flight future is dropped, which abandons the
//! socket on a best-effort basis. No retries are performed: one attempt
//! produces one result.

mod result;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::models::Envelope;

pub use result::{DownstreamAuthResult, TransportErrorKind, resolve_error_message};

/// Header used to correlate the validation call with the inbound request.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fallback message when the auth service rejects without one.
const DEFAULT_BUSINESS_MESSAGE: &str = "auth service error";

/// Anything that can validate a bearer token.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate `token`, classifying every failure mode.
    async fn validate_token(&self, token: &str, request_id: Option<&str>) -> DownstreamAuthResult;
}

/// HTTP token validator backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl AuthClient {
    /// Create a client for `endpoint` with a hard `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigError` if the endpoint is not a valid URL
    /// or the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> GatewayResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            GatewayError::ConfigError(format!("Invalid auth endpoint '{endpoint}': {e}"))
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| GatewayError::ConfigError(format!("Failed to build auth client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Create a client from gateway configuration.
    pub fn from_config(config: &Config) -> GatewayResult<Self> {
        Self::new(&config.auth_endpoint(), config.auth_timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Perform the exchange without the outer timeout.
    async fn exchange(&self, token: &str, request_id: Option<&str>) -> DownstreamAuthResult {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("token", token)]);
        if let Some(id) = request_id {
            request = request.header(REQUEST_ID_HEADER, id);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return DownstreamAuthResult::TransportError(classify_transport_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Auth service returned an error status");
            return DownstreamAuthResult::business(
                i32::from(status.as_u16()),
                resolve_error_message(status),
            );
        }

        match response.bytes().await {
            Ok(body) => parse_envelope(&body),
            Err(e) => DownstreamAuthResult::TransportError(classify_transport_error(&e)),
        }
    }
}

#[async_trait]
impl TokenValidator for AuthClient {
    #[instrument(skip(self, token), fields(endpoint = %self.endpoint))]
    async fn validate_token(&self, token: &str, request_id: Option<&str>) -> DownstreamAuthResult {
        let started = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.exchange(token, request_id)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Auth service call timed out");
                DownstreamAuthResult::TransportError(TransportErrorKind::Timeout)
            }
        };

        metrics::record_auth_duration(started.elapsed().as_secs_f64());
        if let DownstreamAuthResult::TransportError(kind) = &result {
            error!(kind = %kind, "Auth service communication failed");
        }
        result
    }
}

/// Map a reqwest failure onto the transport taxonomy.
fn classify_transport_error(e: &reqwest::Error) -> TransportErrorKind {
    if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if e.is_connect() {
        TransportErrorKind::ConnectRefused
    } else if e.is_decode() {
        TransportErrorKind::MalformedResponse
    } else {
        debug!(error = %e, "Unclassified auth service transport error");
        TransportErrorKind::Other
    }
}

/// Interpret a 2xx body as an [`Envelope`].
///
/// A body that is not an envelope, a JSON `null`, or a success envelope
/// without a usable identifier is a malformed response. A non-200 envelope
/// code is a business error carrying the envelope's own code and message;
/// a blank or `null` message falls back to a generic one.
///
/// A success envelope with `null` or missing `data` is rejected here rather
/// than forwarded as the literal user id `"null"`, which the wire contract
/// would otherwise allow.
pub fn parse_envelope(body: &[u8]) -> DownstreamAuthResult {
    let envelope = match serde_json::from_slice::<Option<Envelope<Value>>>(body) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            warn!("Auth service returned an empty envelope");
            return DownstreamAuthResult::TransportError(TransportErrorKind::MalformedResponse);
        }
        Err(e) => {
            warn!(error = %e, "Auth service returned a malformed envelope");
            return DownstreamAuthResult::TransportError(TransportErrorKind::MalformedResponse);
        }
    };

    if !envelope.is_success() {
        let message = if envelope.message.trim().is_empty() {
            DEFAULT_BUSINESS_MESSAGE.to_string()
        } else {
            envelope.message
        };
        return DownstreamAuthResult::BusinessError {
            code: envelope.code,
            message,
        };
    }

    let subject = match envelope.data {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    if subject.is_empty() {
        warn!("Auth service accepted the token without a user identifier");
        return DownstreamAuthResult::TransportError(TransportErrorKind::MalformedResponse);
    }

    DownstreamAuthResult::Success { subject }
}

/// HTTP status a transport failure maps to before outer normalization.
pub fn transport_status(kind: TransportErrorKind) -> StatusCode {
    match kind {
        TransportErrorKind::ConnectRefused => StatusCode::SERVICE_UNAVAILABLE,
        TransportErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        TransportErrorKind::MalformedResponse | TransportErrorKind::Other => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
