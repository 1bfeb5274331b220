//! Gateway error taxonomy and the global error envelope builder.
//!
//! Every failure that reaches the HTTP boundary is rendered into exactly one
//! [`Envelope`] body by [`render_error`]:
//!
//! | Error                          | HTTP | Envelope code | Message                                   |
//! |--------------------------------|------|---------------|-------------------------------------------|
//! | `Business`                     | 200  | own code      | own message                               |
//! | `Status`                       | own  | own status    | own reason                                |
//! | `UpstreamConnect` / `Timeout`  | 503  | 503           | generic retry message                     |
//! | anything else                  | 500  | 500           | stringified status                        |
//!
//! Internal details are logged server-side and never echoed to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::http::header::{CONTENT_TYPE, HeaderValue};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::Envelope;

/// Caller-visible message for connect failures and timeouts.
pub const RETRY_LATER_MESSAGE: &str = "service temporarily unavailable, retry later";

/// Gateway-wide error type.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A structured business failure carrying its own code and message.
    #[error("Business error {code}: {message}")]
    Business { code: i32, message: String },

    /// A request that cannot be routed, with its declared status and reason.
    #[error("{status}: {reason}")]
    Status { status: StatusCode, reason: String },

    #[error("Failed to connect to upstream: {0}")]
    UpstreamConnect(String),

    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Build a business error.
    pub fn business(code: i32, message: impl Into<String>) -> Self {
        Self::Business {
            code,
            message: message.into(),
        }
    }

    /// Build a routing error with a declared status.
    pub fn status(status: StatusCode, reason: impl Into<String>) -> Self {
        Self::Status {
            status,
            reason: reason.into(),
        }
    }

    /// HTTP status and envelope for this error.
    pub fn envelope(&self) -> (StatusCode, Envelope<()>) {
        match self {
            Self::Business { code, message } => (StatusCode::OK, Envelope::error(*code, message)),
            Self::Status { status, reason } => (
                *status,
                Envelope::error(i32::from(status.as_u16()), reason.as_str()),
            ),
            Self::UpstreamConnect(_) | Self::UpstreamTimeout(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Envelope::error(
                    i32::from(StatusCode::SERVICE_UNAVAILABLE.as_u16()),
                    RETRY_LATER_MESSAGE,
                ),
            ),
            Self::ConfigError(_) | Self::Internal(_) => unhandled_envelope(),
        }
    }
}

/// Envelope for anything not otherwise classified.
fn unhandled_envelope() -> (StatusCode, Envelope<()>) {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        Envelope::error(i32::from(status.as_u16()), status.to_string()),
    )
}

/// A response that is written at most once.
///
/// Once committed, further writes are ignored.
#[derive(Debug, Default)]
pub struct ResponseSlot {
    response: Option<Response>,
}

impl ResponseSlot {
    /// Create an empty, uncommitted slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a response has already been written.
    pub fn is_committed(&self) -> bool {
        self.response.is_some()
    }

    /// Write `response` unless the slot is already committed.
    ///
    /// Returns `true` if this call wrote the response.
    pub fn commit(&mut self, response: Response) -> bool {
        if self.is_committed() {
            return false;
        }
        self.response = Some(response);
        true
    }

    /// Take the committed response, or a bare 500 if nothing was written.
    pub fn into_response(self) -> Response {
        self.response
            .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// Render `error` into `slot` as a JSON envelope.
///
/// No-op returning `false` when the slot is already committed. Never panics.
pub fn render_error(slot: &mut ResponseSlot, error: &GatewayError) -> bool {
    if slot.is_committed() {
        tracing::debug!(error = %error, "Response already committed, skipping error render");
        return false;
    }

    match error {
        GatewayError::Business { .. } => tracing::warn!(error = %error, "Request rejected"),
        _ => tracing::error!(error = %error, "Request failed"),
    }

    let (status, envelope) = error.envelope();
    slot.commit(envelope_response(status, &envelope))
}

/// Serialize an envelope with the given HTTP status.
pub fn envelope_response<T: serde::Serialize>(status: StatusCode, envelope: &Envelope<T>) -> Response {
    let mut response = (status, Json(envelope)).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Render a caught panic as an unhandled error.
///
/// Used by the outermost pipeline stage.
pub fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };

    let mut slot = ResponseSlot::new();
    render_error(&mut slot, &GatewayError::Internal(detail));
    slot.into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut slot = ResponseSlot::new();
        render_error(&mut slot, &self);
        slot.into_response()
    }
}

/// Convenience type alias for Results with GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;
