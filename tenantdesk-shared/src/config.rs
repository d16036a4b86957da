/// Configuration management for the console
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct shared by the CLI and the worker.
///
/// # Environment Variables
///
/// - `BACKEND_URL`: Base URL of the hosted backend (required)
/// - `BACKEND_ANON_KEY`: Public API key sent with every request (required)
/// - `BACKEND_REQUEST_TIMEOUT_SECS`: HTTP timeout for ordinary calls (default: 30)
/// - `SESSION_JWT_SECRET`: Secret used to validate session tokens locally (optional)
/// - `PASSWORD_RESET_REDIRECT`: Redirect URL for password reset emails (optional)
/// - `SESSION_ACCESS_TOKEN`: Access token to resume a session without signing in (optional)
/// - `WEBHOOK_MAX_RETRIES`: Delivery attempts per simulated webhook (default: 3)
/// - `WEBHOOK_SIGNING_SECRET`: Secret for simulated webhook signatures (optional)
/// - `RUST_LOG`: Log level (default: info)
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::config::Config;
///
/// # fn example() -> tenantdesk_shared::error::ConsoleResult<()> {
/// let config = Config::from_env()?;
/// println!("Backend: {}", config.backend.url);
/// # Ok(())
/// # }
/// ```

use crate::error::{ConsoleError, ConsoleResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Complete console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection configuration
    pub backend: BackendConfig,

    /// Session configuration
    pub session: SessionConfig,

    /// Webhook simulator configuration
    pub webhooks: WebhookConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, without trailing slash
    pub url: String,

    /// Public API key
    pub anon_key: String,

    /// Timeout for ordinary calls in seconds
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// JWT secret for local session validation
    ///
    /// When unset, session tokens are trusted as issued by the backend.
    pub jwt_secret: Option<String>,

    /// Where password reset emails send the user
    pub password_reset_redirect: Option<String>,

    /// Access token of a previous sign-in, for non-interactive runs
    pub access_token: Option<String>,
}

/// Webhook simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Maximum delivery attempts per webhook
    pub max_retries: u32,

    /// HMAC secret for payload signatures
    pub signing_secret: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        WebhookConfig {
            max_retries: 3,
            signing_secret: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> ConsoleResult<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let url = require("BACKEND_URL")?;
        let anon_key = require("BACKEND_ANON_KEY")?;
        let request_timeout_secs = parse_or("BACKEND_REQUEST_TIMEOUT_SECS", 30u64)?;

        let max_retries = parse_or("WEBHOOK_MAX_RETRIES", 3u32)?;
        if max_retries == 0 {
            return Err(ConsoleError::Config(
                "WEBHOOK_MAX_RETRIES must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            backend: BackendConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
                request_timeout_secs,
            },
            session: SessionConfig {
                jwt_secret: optional("SESSION_JWT_SECRET"),
                password_reset_redirect: optional("PASSWORD_RESET_REDIRECT"),
                access_token: optional("SESSION_ACCESS_TOKEN"),
            },
            webhooks: WebhookConfig {
                max_retries,
                signing_secret: optional("WEBHOOK_SIGNING_SECRET"),
            },
        })
    }

    /// Configuration for runs that never touch the network
    pub fn offline() -> Self {
        Self {
            backend: BackendConfig {
                url: "http://localhost".to_string(),
                anon_key: String::new(),
                request_timeout_secs: 30,
            },
            session: SessionConfig::default(),
            webhooks: WebhookConfig::default(),
        }
    }
}

fn require(name: &str) -> ConsoleResult<String> {
    env::var(name)
        .map_err(|_| ConsoleError::Config(format!("{} environment variable is required", name)))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> ConsoleResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConsoleError::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
