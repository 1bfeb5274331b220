use std::fmt;

use axum::http::StatusCode;

/// Why the downstream call produced no usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectRefused,
    Timeout,
    MalformedResponse,
    Other,
}

impl TransportErrorKind {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectRefused => "connect_refused",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one token validation round trip.
///
/// Produced once per protected request and consumed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamAuthResult {
    /// Token accepted; `subject` is the verified user identifier.
    Success { subject: String },
    /// The auth service rejected the token or reported a structured failure.
    BusinessError { code: i32, message: String },
    /// No usable answer from the auth service.
    TransportError(TransportErrorKind),
}

impl DownstreamAuthResult {
    pub fn business(code: i32, message: impl Into<String>) -> Self {
        Self::BusinessError {
            code,
            message: message.into(),
        }
    }
}

/// Message returned to clients for a non-2xx auth service response.
pub fn resolve_error_message(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "auth service internal error"
    } else if status == StatusCode::UNAUTHORIZED {
        "token expired/invalid"
    } else if status == StatusCode::BAD_REQUEST {
        "invalid token format"
    } else {
        "auth service error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_message_by_status_class() {
        assert_eq!(
            resolve_error_message(StatusCode::INTERNAL_SERVER_ERROR),
            "auth service internal error"
        );
        assert_eq!(
            resolve_error_message(StatusCode::BAD_GATEWAY),
            "auth service internal error"
        );
        assert_eq!(
            resolve_error_message(StatusCode::UNAUTHORIZED),
            "token expired/invalid"
        );
        assert_eq!(
            resolve_error_message(StatusCode::BAD_REQUEST),
            "invalid token format"
        );
        assert_eq!(resolve_error_message(StatusCode::FORBIDDEN), "auth service error");
        assert_eq!(resolve_error_message(StatusCode::NOT_FOUND), "auth service error");
    }

    #[test]
    fn test_transport_kind_labels() {
        assert_eq!(TransportErrorKind::ConnectRefused.to_string(), "connect_refused");
        assert_eq!(TransportErrorKind::Timeout.as_str(), "timeout");
    }
}
