//! Client IP resolution for the `user_ip` header.
//!
//! # Header Priority
//!
//! Headers are consulted in [`PROXY_HEADERS`] order. For each header present,
//! the value before the first comma is trimmed, an IPv4 `:port` suffix is
//! removed, and the result is used if it parses as an IPv4 or IPv6 literal.
//! Invalid values (including the literal `unknown` some proxies send) fall
//! through to the next header.
//!
//! When no header yields an address, the transport peer address recorded by
//! Axum's `ConnectInfo` is used, and failing that [`UNKNOWN_IP`].
//!
//! # Security Warning: IP Spoofing Risk
//!
//! **These headers are client-controlled.** The resolver honours documented
//! precedence only and performs no trusted-proxy verification. Deploy behind a
//! reverse proxy that overwrites these headers before they reach the gateway.

use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::debug;

/// Fallback value when no client IP can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Proxy headers consulted for the client address, highest priority first.
pub const PROXY_HEADERS: [&str; 4] = [
    "X-Forwarded-For",
    "Proxy-Client-IP",
    "WL-Proxy-Client-IP",
    "X-Real-IP",
];

/// Resolve the originating client address of `req`.
///
/// Never fails; returns [`UNKNOWN_IP`] when nothing usable is found.
pub fn resolve_client_ip<B>(req: &Request<B>) -> Cow<'static, str> {
    for name in PROXY_HEADERS {
        let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };

        match clean_candidate(value) {
            Some(ip) => {
                debug!(header = name, client_ip = %ip, "Resolved client IP from proxy header");
                return Cow::Owned(ip.to_string());
            }
            None => debug!(header = name, "Ignoring invalid client IP header value"),
        }
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(peer)) => Cow::Owned(peer.ip().to_string()),
        None => Cow::Borrowed(UNKNOWN_IP),
    }
}

/// Reduce a raw header value to a bare IP literal, if it holds one.
fn clean_candidate(value: &str) -> Option<&str> {
    let first = value.split(',').next().unwrap_or_default().trim();
    let candidate = strip_ipv4_port(first);
    candidate.parse::<IpAddr>().ok().map(|_| candidate)
}

/// Drop a `:port` suffix from an IPv4-shaped address.
///
/// IPv6 literals also contain colons, so anything whose host part is not a
/// dotted IPv4 address is returned unchanged.
fn strip_ipv4_port(value: &str) -> &str {
    match value.rsplit_once(':') {
        Some((host, port))
            if host.parse::<Ipv4Addr>().is_ok() && port.parse::<u16>().is_ok() =>
        {
            host
        }
        _ => value,
    }
}
