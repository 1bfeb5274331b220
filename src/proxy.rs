//! Forwarding of approved requests to the upstream.
//!
//! The router's fallback handler. Every request that reaches it has already
//! passed the authorization stage and carries the context headers. Method,
//! path, query, end-to-end headers and body are sent to `UPSTREAM_URL`; the
//! upstream status, headers and body are returned as-is.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::state::AppState;

/// Headers that describe a single connection and are never forwarded.
static HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forward an approved request upstream.
#[instrument(skip_all, fields(method = %req.method(), path = %req.uri().path()))]
pub async fn forward(State(state): State<AppState>, req: Request) -> Response {
    match forward_request(&state, req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn forward_request(state: &AppState, req: Request) -> GatewayResult<Response> {
    let (parts, body) = req.into_parts();
    let url = upstream_url(&state.config.upstream_url, &parts.uri)?;

    let body = axum::body::to_bytes(body, state.config.max_request_body_size)
        .await
        .map_err(|_| {
            GatewayError::status(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
        })?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    debug!(url = %url, "Forwarding request upstream");
    let upstream = state
        .http
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(upstream_error)?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    let bytes = upstream.bytes().await.map_err(upstream_error)?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Join the upstream base URL with the inbound path and query.
pub fn upstream_url(base: &str, uri: &Uri) -> GatewayResult<Url> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let joined = format!("{}{}", base.trim_end_matches('/'), path_and_query);

    Url::parse(&joined)
        .map_err(|e| GatewayError::Internal(format!("Invalid upstream URL '{joined}': {e}")))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by `Connection` are connection-scoped as well
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP_HEADERS.iter()) {
        headers.remove(name);
    }
}

/// Map a reqwest failure onto the gateway error taxonomy.
fn upstream_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        metrics::record_upstream_error("timeout");
        GatewayError::UpstreamTimeout(e.to_string())
    } else if e.is_connect() {
        metrics::record_upstream_error("connect");
        GatewayError::UpstreamConnect(e.to_string())
    } else {
        metrics::record_upstream_error("other");
        GatewayError::Internal(format!("Upstream request failed: {e}"))
    }
}
