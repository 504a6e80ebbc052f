//! Engine configuration.
//!
//! Configuration is loaded from environment variables with defaults
//! suitable for local development.

use std::time::Duration;

use crate::error::{AuthzError, AuthzResult};
use crate::retry::RetryConfig;

/// Authorization engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthzConfig {
    /// Seconds between periodic full refreshes; `0` disables polling.
    pub poll_interval_secs: u64,

    /// Retry policy for store reads during refresh.
    pub store_retry: RetryConfig,

    /// Consecutive refresh failures of one domain before it is reported
    /// at error level.
    pub failure_alert_threshold: u32,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            store_retry: RetryConfig::default(),
            failure_alert_threshold: 3,
        }
    }
}

impl AuthzConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AUTHZ_POLL_INTERVAL_SECS`: Periodic refresh interval (default: 30, 0 disables)
    /// - `AUTHZ_STORE_MAX_RETRIES`: Attempts per store read (default: 3)
    /// - `AUTHZ_STORE_RETRY_INITIAL_MS`: First retry delay (default: 100)
    /// - `AUTHZ_STORE_RETRY_MAX_MS`: Maximum retry delay (default: 5000)
    /// - `AUTHZ_FAILURE_ALERT_THRESHOLD`: Failures before alerting (default: 3)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source, using the same keys
    /// as [`AuthzConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let parse = |key: &str| lookup(key).and_then(|s| s.parse::<u64>().ok());

        Self {
            poll_interval_secs: parse("AUTHZ_POLL_INTERVAL_SECS")
                .unwrap_or(default.poll_interval_secs),
            store_retry: RetryConfig {
                max_attempts: parse("AUTHZ_STORE_MAX_RETRIES")
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(default.store_retry.max_attempts),
                initial_delay: parse("AUTHZ_STORE_RETRY_INITIAL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(default.store_retry.initial_delay),
                max_delay: parse("AUTHZ_STORE_RETRY_MAX_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(default.store_retry.max_delay),
                ..default.store_retry
            },
            failure_alert_threshold: parse("AUTHZ_FAILURE_ALERT_THRESHOLD")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(default.failure_alert_threshold),
        }
    }

    /// Polling interval, or `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> AuthzResult<()> {
        if self.store_retry.max_attempts == 0 {
            return Err(AuthzError::InvalidConfig {
                key: "AUTHZ_STORE_MAX_RETRIES".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        if self.store_retry.initial_delay > self.store_retry.max_delay {
            return Err(AuthzError::InvalidConfig {
                key: "AUTHZ_STORE_RETRY_INITIAL_MS".to_string(),
                message: "initial delay exceeds maximum delay".to_string(),
            });
        }
        if self.failure_alert_threshold == 0 {
            return Err(AuthzError::InvalidConfig {
                key: "AUTHZ_FAILURE_ALERT_THRESHOLD".to_string(),
                message: "threshold must be positive".to_string(),
            });
        }
        Ok(())
    }
}
