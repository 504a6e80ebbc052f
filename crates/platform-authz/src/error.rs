//! Error types for the authorization engine
//!
//! Enforcement itself never fails: it returns a decision. These errors
//! come from refreshing the cache, from the policy store, and from the
//! administrative surface.

use platform_events::EventBusError;
use platform_rbac::ModelError;
use thiserror::Error;

/// Authorization engine error types.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A domain's policy cannot be compiled (malformed tuple, bad edge)
    #[error("Configuration error in domain {domain:?}: {message}")]
    Configuration {
        /// Domain whose rebuild failed
        domain: String,
        /// What was wrong
        message: String,
    },

    /// Role inheritance loops back on itself
    #[error("Cyclic role hierarchy in domain {domain:?}: {path}")]
    CyclicHierarchy {
        /// Domain containing the cycle
        domain: String,
        /// Roles along the cycle, e.g. `a -> b -> a`
        path: String,
    },

    /// A tuple failed validation
    #[error("Invalid policy tuple: {0}")]
    InvalidTuple(#[from] ModelError),

    /// The policy store could not be reached
    #[error("Policy store unavailable: {0}")]
    StoreUnavailable(String),

    /// Publishing a change notification failed
    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    /// Configuration value could not be used
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },
}

/// Result type for authorization engine operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

impl AuthzError {
    /// Check if this error means the domain's policy is broken.
    ///
    /// Configuration errors keep the domain on its last good snapshot
    /// until an administrator fixes the data; retrying will not help.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthzError::Configuration { .. }
                | AuthzError::CyclicHierarchy { .. }
                | AuthzError::InvalidTuple(_)
        )
    }

    /// Check if a retry of the same store call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthzError::StoreUnavailable(_))
    }

    /// Get error code for logs and API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthzError::Configuration { .. } => "POLICY_CONFIGURATION",
            AuthzError::CyclicHierarchy { .. } => "POLICY_CYCLE",
            AuthzError::InvalidTuple(_) => "POLICY_INVALID_TUPLE",
            AuthzError::StoreUnavailable(_) => "POLICY_STORE_UNAVAILABLE",
            AuthzError::EventBus(_) => "EVENT_BUS_ERROR",
            AuthzError::InvalidConfig { .. } => "CONFIG_ERROR",
        }
    }
}
