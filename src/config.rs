//! Configuration for SAM bridge connections.
//!
//! This module provides the endpoint and the I/O limits applied to every
//! control connection the client opens.

use crate::error::{Result, SamError};
use std::time::Duration;

/// Default address of the SAM bridge of a local router.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:7656";

/// Environment variable consulted by [`SamConfig::from_env`].
pub const ENDPOINT_ENV_VAR: &str = "SAM_ENDPOINT";

/// Configuration for connecting to a SAM bridge.
#[derive(Debug, Clone)]
pub struct SamConfig {
    /// The `host:port` of the bridge.
    pub endpoint: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout for a reply to arrive.
    pub read_timeout: Duration,
    /// Timeout for a command to be written.
    pub write_timeout: Duration,
    /// Maximum number of write calls used to send `SESSION CREATE`.
    pub max_write_attempts: usize,
    /// Maximum size of a single reply line.
    pub max_reply_len: usize,
}

impl Default for SamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(30),
            max_write_attempts: 15,
            max_reply_len: 8192,
        }
    }
}

impl SamConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings, with the endpoint taken from `SAM_ENDPOINT` if set.
    pub fn from_env() -> Self {
        match std::env::var(ENDPOINT_ENV_VAR) {
            Ok(endpoint) if !endpoint.trim().is_empty() => {
                Self::default().endpoint(endpoint.trim())
            }
            _ => Self::default(),
        }
    }

    /// Set the bridge endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the maximum number of write attempts for session creation.
    pub fn max_write_attempts(mut self, attempts: usize) -> Self {
        self.max_write_attempts = attempts;
        self
    }

    /// Set the maximum reply size.
    pub fn max_reply_len(mut self, len: usize) -> Self {
        self.max_reply_len = len;
        self
    }

    /// Check the configuration for values that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(SamError::ConfigurationError(
                "Endpoint must not be empty".to_string(),
            ));
        }
        if !self.endpoint.contains(':') {
            return Err(SamError::ConfigurationError(format!(
                "Endpoint '{}' is not in host:port form",
                self.endpoint
            )));
        }
        if self.max_write_attempts == 0 {
            return Err(SamError::ConfigurationError(
                "max_write_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_reply_len == 0 {
            return Err(SamError::ConfigurationError(
                "max_reply_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
