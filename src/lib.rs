//! # Edge Gateway
//!
//! Edge authentication interceptor for an API gateway, built on Axum:
//!
//! - **Path classification**: glob patterns decide which routes need a token
//! - **Token validation**: one bounded call to a downstream auth service
//! - **Context propagation**: verified `user_id` and resolved `user_ip`
//!   headers on every forwarded request
//! - **Uniform errors**: every failure rendered as one JSON envelope
//! - **Credential transport**: AES-256-GCM blobs with a freshness window
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (CatchPanic → RequestId → Trace → Cors → Limit)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Authorization (ProtectedPaths, client IP, TokenValidator)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  /health  |  Upstream forwarder                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edge_gateway::{AppState, AuthClient, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let validator = Arc::new(AuthClient::from_config(&config)?);
//!
//!     let state = AppState::new(config, validator)?;
//!     let app = build_router(state);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Protecting Routes
//!
//! ```bash
//! PROTECTED_PATHS='/orders/**,/customer/*/profile' cargo run
//! ```

pub mod auth_client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod routes;
pub mod state;

// Re-exports for convenience
pub use auth_client::{AuthClient, DownstreamAuthResult, TokenValidator, TransportErrorKind};
pub use config::Config;
pub use crypto::{CipherError, CredentialCipher, DecryptedCredential};
pub use error::{GatewayError, GatewayResult};
pub use routes::{PIPELINE_ORDER, Stage, build_router};
pub use state::AppState;
