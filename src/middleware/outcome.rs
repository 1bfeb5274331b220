//! Normalization of downstream auth results into forward/reject outcomes.
//!
//! | Result                               | Outcome                              |
//! |--------------------------------------|--------------------------------------|
//! | `Success { subject }`                | forward with `user_id`, `user_ip`    |
//! | `BusinessError { code, message }`    | reject, HTTP 200, envelope code      |
//! | `ConnectRefused` / `Timeout`         | reject, HTTP 503, retry message      |
//! | `MalformedResponse` / `Other`        | reject, HTTP 500, generic message    |

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::auth_client::{DownstreamAuthResult, TransportErrorKind, transport_status};
use crate::error::{RETRY_LATER_MESSAGE, envelope_response};
use crate::models::Envelope;

/// Header carrying the verified user identifier.
pub const USER_ID_HEADER: &str = "user_id";

/// Header carrying the resolved client address.
pub const USER_IP_HEADER: &str = "user_ip";

/// Message for auth responses the gateway could not interpret.
pub const AUTH_ERROR_MESSAGE: &str = "auth service error";

/// Context headers to attach to the forwarded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardHeaders {
    pub user_id: Option<String>,
    pub user_ip: String,
}

impl ForwardHeaders {
    /// Headers for an unprotected request: client address only.
    pub fn ip_only(user_ip: impl Into<String>) -> Self {
        Self {
            user_id: None,
            user_ip: user_ip.into(),
        }
    }

    /// Headers for a verified request.
    pub fn verified(user_id: impl Into<String>, user_ip: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            user_ip: user_ip.into(),
        }
    }
}

/// A rejected request, rendered as an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub code: i32,
    pub message: String,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        envelope_response(self.status, &Envelope::error(self.code, self.message))
    }
}

/// What the authorization stage does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Forward(ForwardHeaders),
    Reject(Rejection),
}

impl Outcome {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Forward(_) => "forward",
            Outcome::Reject(r) if r.status == StatusCode::OK => "business_error",
            Outcome::Reject(r) if r.status == StatusCode::SERVICE_UNAVAILABLE => "unavailable",
            Outcome::Reject(_) => "auth_error",
        }
    }
}

/// Turn a downstream result into an outcome for the request from `client_ip`.
pub fn normalize(result: DownstreamAuthResult, client_ip: &str) -> Outcome {
    match result {
        DownstreamAuthResult::Success { subject } => {
            debug!(user_id = %subject, "Token verified");
            Outcome::Forward(ForwardHeaders::verified(subject, client_ip))
        }
        DownstreamAuthResult::BusinessError { code, message } => {
            warn!(code, message = %message, client_ip, "Token rejected by auth service");
            Outcome::Reject(Rejection {
                status: StatusCode::OK,
                code,
                message,
            })
        }
        DownstreamAuthResult::TransportError(kind) => {
            let internal = transport_status(kind);
            let (status, message) = match kind {
                // Timeouts surface exactly like connect failures
                TransportErrorKind::ConnectRefused | TransportErrorKind::Timeout => {
                    (StatusCode::SERVICE_UNAVAILABLE, RETRY_LATER_MESSAGE)
                }
                TransportErrorKind::MalformedResponse | TransportErrorKind::Other => {
                    (StatusCode::INTERNAL_SERVER_ERROR, AUTH_ERROR_MESSAGE)
                }
            };
            warn!(kind = %kind, internal_status = %internal, status = %status, client_ip, "Auth unavailable");
            Outcome::Reject(Rejection {
                status,
                code: i32::from(status.as_u16()),
                message: message.to_string(),
            })
        }
    }
}

/// Derive the forwarded request from `req` with the context headers set.
///
/// Client-supplied `user_id`/`user_ip` values are always replaced or removed,
/// so they can only ever come from this gateway.
pub fn with_headers(req: Request<Body>, headers: &ForwardHeaders) -> Request<Body> {
    let (mut parts, body) = req.into_parts();

    parts.headers.remove(USER_ID_HEADER);
    if let Some(user_id) = &headers.user_id {
        insert_header(&mut parts.headers, USER_ID_HEADER, user_id);
    }
    insert_header(&mut parts.headers, USER_IP_HEADER, &headers.user_ip);

    Request::from_parts(parts, body)
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => {
            warn!(header = name, "Dropping context header with invalid characters");
            headers.remove(name);
        }
    }
}
