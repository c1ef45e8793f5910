//! Configuration with validation at runtime.

use clap::{Args, Parser};

use crate::registry::DEFAULT_KEY;

/// Default request body limit for binding (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Form binding configuration.
///
/// Flatten into a host CLI with `#[command(flatten)]`; every value can also
/// be set via environment variables.
#[derive(Debug, Clone, Args)]
pub struct BindConfig {
    /// Maximum request body size accepted for binding, in bytes
    #[arg(long = "form-max-body-bytes", env = "FORM_MAX_BODY_BYTES", default_value = "2097152")]
    pub max_body_bytes: usize,

    /// Registry key of the error handler used when none is named
    #[arg(long = "form-error-key", env = "FORM_ERROR_KEY", default_value = DEFAULT_KEY)]
    pub error_key: String,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            error_key: DEFAULT_KEY.to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Form body limit must be > 0")]
    InvalidBodyLimit,
    #[error("Form error handler key must not be empty")]
    EmptyErrorKey,
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),
}

impl BindConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for a zero body limit or a blank key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidBodyLimit);
        }
        if self.error_key.trim().is_empty() {
            return Err(ConfigError::EmptyErrorKey);
        }
        Ok(())
    }
}

/// Demo server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "form-binding-demo", about = "Form binding demo server")]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "HTTP_ADDRESS", default_value = "0.0.0.0:8080")]
    pub address: String,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Use JSON log format
    #[arg(long, env = "JSON_LOGS", default_value = "false")]
    pub json_logs: bool,

    #[command(flatten)]
    pub bind: BindConfig,
}

impl Config {
    /// Parse and validate configuration.
    ///
    /// # Errors
    /// Returns an error if any value fails validation.
    pub fn init() -> anyhow::Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidAddress(self.address.clone()));
        }
        self.bind.validate()
    }
}
