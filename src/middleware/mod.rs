//! Request interception: path classification, client IP resolution and
//! token authorization.
//!
//! # Architecture
//!
//! ```text
//! Request → ProtectedPaths ─┬─ unprotected ─────────────────────────┐
//!                           └─ protected → TokenValidator → normalize┤
//!                                                                    ▼
//!                                       forward (user_id, user_ip) | envelope
//! ```
//!
//! # Security Considerations
//!
//! - Client IP resolution trusts proxy headers in a fixed precedence order
//!   and performs no proxy trust verification
//! - `user_id` on a forwarded request is only ever set by this gateway

pub mod auth;
pub mod ip;
pub mod outcome;
pub mod path_match;

pub use auth::{AuthorizationLayer, AuthorizationService};
pub use ip::{PROXY_HEADERS, UNKNOWN_IP, resolve_client_ip};
pub use outcome::{
    AUTH_ERROR_MESSAGE, ForwardHeaders, Outcome, Rejection, USER_ID_HEADER, USER_IP_HEADER,
    normalize, with_headers,
};
pub use path_match::{ProtectedPaths, glob_match};
