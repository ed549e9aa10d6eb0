//! Configuration module for msbridge.
//!
//! Provides typed configuration structs with loading from an optional YAML
//! file, environment-variable credential injection, defaults, and
//! validation. Credentials are only ever read from the environment and are
//! never serialized back out.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Environment variables holding the OAuth client credentials.
/// The `MSBRIDGE_*` names win; the standard `AZURE_*` names are a fallback.
const TENANT_ID_VARS: &[&str] = &["MSBRIDGE_TENANT_ID", "AZURE_TENANT_ID"];
const CLIENT_ID_VARS: &[&str] = &["MSBRIDGE_CLIENT_ID", "AZURE_CLIENT_ID"];
const CLIENT_SECRET_VARS: &[&str] = &["MSBRIDGE_CLIENT_SECRET", "AZURE_CLIENT_SECRET"];

/// Top-level configuration for msbridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth client credentials. Not part of the config file.
    #[serde(skip)]
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub request: RequestConfig,
    pub logging: LoggingConfig,
}

/// OAuth client-credentials identity.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Directory (tenant) id segment of the token endpoint URL.
    pub tenant_id: Option<String>,
    /// Application (client) id.
    pub client_id: Option<String>,
    /// Client secret. Never logged, never serialized.
    pub client_secret: Option<String>,
}

impl AuthConfig {
    /// True when all three credential parts are present.
    pub fn is_complete(&self) -> bool {
        self.tenant_id.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Process-wide fixed-window rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Permits admitted per window.
    pub max_per_window: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

/// Retry defaults applied when a request does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

/// Per-dispatch request defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Overall dispatch deadline in milliseconds.
    pub default_timeout_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: 100,
            window_secs: 60,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file at `path`, then merge env credentials.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.auth = AuthConfig::from_env();
        Ok(config)
    }

    /// Try to load from `path`; fall back to defaults (plus env credentials)
    /// on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|_| Self::from_env())
    }

    /// Defaults for everything, credentials from the environment.
    pub fn from_env() -> Self {
        Self {
            auth: AuthConfig::from_env(),
            ..Default::default()
        }
    }

    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Missing credentials
    /// are deliberately not an error here: the engine starts degraded and
    /// the health tool reports it.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.rate_limit.max_per_window == 0 {
            errors.push(ValidationError {
                field: "rate_limit.max_per_window".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.rate_limit.window_secs == 0 {
            errors.push(ValidationError {
                field: "rate_limit.window_secs".into(),
                message: "must be at least 1".into(),
            });
        }

        if self.retry.max_retries > 5 {
            errors.push(ValidationError {
                field: "retry.max_retries".into(),
                message: "must be at most 5".into(),
            });
        }
        if !(100..=10_000).contains(&self.retry.base_delay_ms) {
            errors.push(ValidationError {
                field: "retry.base_delay_ms".into(),
                message: "must be within 100..=10000".into(),
            });
        }

        if !(5_000..=300_000).contains(&self.request.default_timeout_ms) {
            errors.push(ValidationError {
                field: "request.default_timeout_ms".into(),
                message: "must be within 5000..=300000".into(),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!("must be one of {}", VALID_LOG_LEVELS.join(", ")),
            });
        }

        errors
    }
}

impl AuthConfig {
    /// Read credentials from the environment. Absent variables leave the
    /// corresponding field `None`.
    pub fn from_env() -> Self {
        Self {
            tenant_id: first_env(TENANT_ID_VARS),
            client_id: first_env(CLIENT_ID_VARS),
            client_secret: first_env(CLIENT_SECRET_VARS),
        }
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"rate_limit.window_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];
