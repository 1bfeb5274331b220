//! Gateway configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Authentication
//!
//! - `AUTH_SERVICE_URL`: Base URL of the identity service (default: `http://customer-web`)
//! - `AUTH_TOKEN_PATH`: Token validation path (default: `/user/auth_token`)
//! - `AUTH_TIMEOUT_MS`: Hard timeout for the validation call (default: 3000)
//! - `PROTECTED_PATHS`: Comma-separated glob patterns requiring a token
//!
//! # Credential Transport
//!
//! - `CREDENTIAL_KEY`: Pre-shared 32-byte AES-256-GCM key. Unset disables the cipher.

use std::env;
use std::time::Duration;

use url::Url;

use crate::crypto::KEY_LENGTH;
use crate::error::{GatewayError, GatewayResult};

/// Gateway configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Gateway will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    // =========================================================================
    // Forwarding Configuration
    // =========================================================================
    /// Where approved requests are forwarded
    pub upstream_url: String,

    /// Timeout for forwarded requests (default: 30 seconds)
    pub upstream_timeout: Duration,

    /// Maximum request body size in bytes (default: 10MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Base URL of the auth service, already resolved to a reachable endpoint
    pub auth_service_url: String,

    /// Path of the token validation endpoint
    pub auth_token_path: String,

    /// Hard timeout for token validation (default: 3 seconds)
    pub auth_timeout: Duration,

    /// Ordered glob patterns of routes that require a token
    pub protected_paths: Vec<String>,

    /// Pre-shared key for credential transport encryption
    pub credential_key: Option<String>,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// Comma-separated list of allowed CORS origins
    /// Use "*" to allow all origins (not recommended for production)
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    // Log filtering is read from `RUST_LOG` by the subscriber in `main`

    /// Port for Prometheus metrics endpoint (0 = disabled)
    pub metrics_port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("upstream_url", &self.upstream_url)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("max_request_body_size", &self.max_request_body_size)
            .field("auth_service_url", &self.auth_service_url)
            .field("auth_token_path", &self.auth_token_path)
            .field("auth_timeout", &self.auth_timeout)
            .field("protected_paths", &self.protected_paths)
            .field(
                "credential_key",
                &self.credential_key.as_ref().map(|_| "<redacted>"),
            )
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigError` if any value is malformed or
    /// inconsistent (e.g., non-numeric PORT, a credential key of the wrong length).
    pub fn from_env() -> GatewayResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or(defaults.host),
            port: Self::parse_env("PORT", defaults.port)?,

            // Forwarding
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            upstream_timeout: Duration::from_secs(Self::parse_env("UPSTREAM_TIMEOUT_SECS", 30)?),
            max_request_body_size: Self::parse_env(
                "MAX_REQUEST_BODY_SIZE",
                defaults.max_request_body_size,
            )?,

            // Authentication
            auth_service_url: env::var("AUTH_SERVICE_URL").unwrap_or(defaults.auth_service_url),
            auth_token_path: env::var("AUTH_TOKEN_PATH").unwrap_or(defaults.auth_token_path),
            auth_timeout: Duration::from_millis(Self::parse_env("AUTH_TIMEOUT_MS", 3000)?),
            protected_paths: env::var("PROTECTED_PATHS")
                .map(|raw| Self::parse_list(&raw))
                .unwrap_or(defaults.protected_paths),
            credential_key: env::var("CREDENTIAL_KEY").ok().filter(|k| !k.is_empty()),

            // HTTP
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|raw| Self::parse_list(&raw))
                .unwrap_or(defaults.cors_allowed_origins),

            // Observability
            metrics_port: Self::parse_env("METRICS_PORT", defaults.metrics_port)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigError` if validation fails.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.auth_timeout.is_zero() {
            return Err(GatewayError::ConfigError(
                "AUTH_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.upstream_timeout.is_zero() {
            return Err(GatewayError::ConfigError(
                "UPSTREAM_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(GatewayError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Self::validate_http_url("UPSTREAM_URL", &self.upstream_url)?;
        Self::validate_http_url("AUTH_SERVICE_URL", &self.auth_service_url)?;

        if !self.auth_token_path.starts_with('/') {
            return Err(GatewayError::ConfigError(format!(
                "AUTH_TOKEN_PATH must start with '/': {}",
                self.auth_token_path
            )));
        }

        if let Some(bad) = self.protected_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(GatewayError::ConfigError(format!(
                "PROTECTED_PATHS entry must start with '/': {bad}"
            )));
        }

        if let Some(key) = &self.credential_key
            && key.len() != KEY_LENGTH
        {
            return Err(GatewayError::ConfigError(format!(
                "CREDENTIAL_KEY must be exactly {KEY_LENGTH} bytes, got {}",
                key.len()
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full URL of the token validation endpoint.
    pub fn auth_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.auth_service_url.trim_end_matches('/'),
            self.auth_token_path
        )
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    fn validate_http_url(name: &str, value: &str) -> GatewayResult<()> {
        let url = Url::parse(value)
            .map_err(|e| GatewayError::ConfigError(format!("Invalid {name} '{value}': {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(GatewayError::ConfigError(format!(
                "{name} must use http or https, got '{other}'"
            ))),
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> GatewayResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| GatewayError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Split a comma-separated list, dropping blanks.
    fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Forwarding
            upstream_url: "http://127.0.0.1:8081".to_string(),
            upstream_timeout: Duration::from_secs(30),
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            // Authentication
            auth_service_url: "http://customer-web".to_string(),
            auth_token_path: "/user/auth_token".to_string(),
            auth_timeout: Duration::from_secs(3),
            protected_paths: vec![
                "/customer/web/test_auth".to_string(),
                "/customer/web/test_auth2".to_string(),
            ],
            credential_key: None,
            // HTTP
            cors_allowed_origins: vec!["*".to_string()],
            // Observability
            metrics_port: 0,
        }
    }
}
