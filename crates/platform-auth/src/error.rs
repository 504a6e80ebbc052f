//! Error types for guarded operations
//!
//! This module defines the errors a guarded entry point can return, from
//! identifying the caller through the final permission check.

use platform_rbac::Permission;
use thiserror::Error;

/// Access guard error types.
///
/// Unauthenticated and token errors mean the caller could not be
/// identified; `Forbidden` means the caller was identified and denied.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No caller identity in the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// JWT token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// JWT token is invalid (malformed, bad signature, etc.)
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token is missing required claims
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    /// Caller lacks a permission the operation requires
    #[error("Forbidden: missing permission {permission}")]
    Forbidden {
        /// The first required permission that was denied
        permission: Permission,
    },

    /// Operation has no registered permission requirements
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for access guard operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Denials and bad credentials are expected and should not be logged
    /// as errors.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::Internal(_) | AuthError::ConfigError(_) | AuthError::UnknownOperation(_)
        )
    }

    /// Check if the caller could not be identified.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::Unauthenticated(_)
                | AuthError::TokenExpired
                | AuthError::InvalidToken(_)
                | AuthError::MissingClaim(_)
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Unauthenticated(_)
            | AuthError::TokenExpired
            | AuthError::InvalidToken(_)
            | AuthError::MissingClaim(_) => 401,

            AuthError::Forbidden { .. } => 403,

            AuthError::UnknownOperation(_) | AuthError::ConfigError(_) | AuthError::Internal(_) => {
                500
            }
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated(_) => "UNAUTHENTICATED",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::MissingClaim(_) => "MISSING_CLAIM",
            AuthError::Forbidden { .. } => "FORBIDDEN",
            AuthError::UnknownOperation(_) => "UNKNOWN_OPERATION",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::Unauthenticated("no token".into()).status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        let forbidden = AuthError::Forbidden {
            permission: Permission::new("doc", "delete"),
        };
        assert_eq!(forbidden.status_code(), 403);
        assert_eq!(AuthError::UnknownOperation("x".into()).status_code(), 500);
    }

    #[test]
    fn test_forbidden_names_permission() {
        let forbidden = AuthError::Forbidden {
            permission: Permission::new("doc", "delete"),
        };
        assert_eq!(forbidden.to_string(), "Forbidden: missing permission doc:delete");
        assert_eq!(forbidden.error_code(), "FORBIDDEN");
        assert!(!forbidden.is_unauthenticated());
    }

    #[test]
    fn test_token_errors_are_unauthenticated() {
        assert!(AuthError::InvalidToken("bad".into()).is_unauthenticated());
        assert!(AuthError::MissingClaim("sub".into()).is_unauthenticated());
        assert!(!AuthError::Internal("boom".into()).is_unauthenticated());
    }
}
