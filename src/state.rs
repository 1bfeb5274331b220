//! Shared application state.
//!
//! Everything here is built once at startup and cloned cheaply into every
//! request: the configuration, the token validator, the compiled
//! protected-path set, the upstream HTTP client and the optional credential
//! cipher.
//!
//! The cipher is not used on the forwarding path; it is held here for
//! credential-submission handlers, which read it through [`AppState::cipher`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::auth_client::TokenValidator;
use crate::config::Config;
use crate::crypto::CredentialCipher;
use crate::error::{GatewayError, GatewayResult};
use crate::middleware::ProtectedPaths;

/// Shared application state for handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Downstream token validator
    pub validator: Arc<dyn TokenValidator>,
    /// Routes that require a token
    pub protected: ProtectedPaths,
    /// Client used to forward approved requests
    pub http: reqwest::Client,
    /// Credential cipher, present when a key is configured
    cipher: Option<CredentialCipher>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("protected", &self.protected)
            .field("cipher", &self.cipher.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build the state from configuration and a token validator.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigError` if the credential key is invalid
    /// or the upstream client cannot be built.
    pub fn new(config: Config, validator: Arc<dyn TokenValidator>) -> GatewayResult<Self> {
        let cipher = config
            .credential_key
            .as_deref()
            .map(|key| CredentialCipher::new(key.as_bytes()))
            .transpose()
            .map_err(|e| GatewayError::ConfigError(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| {
                GatewayError::ConfigError(format!("Failed to build upstream client: {e}"))
            })?;

        let protected = ProtectedPaths::new(config.protected_paths.clone());
        info!(
            patterns = protected.patterns().len(),
            credential_cipher = cipher.is_some(),
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            validator,
            protected,
            http,
            cipher,
            started_at: Instant::now(),
        })
    }

    /// The credential cipher, if a key is configured.
    pub fn cipher(&self) -> Option<&CredentialCipher> {
        self.cipher.as_ref()
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
