//! Caller identity and request context
//!
//! This module provides the types a guarded entry point uses to find out
//! who is calling and in which domain (tenant), before any permission is
//! checked.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{AuthError, AuthResult};

/// The authenticated principal of a request.
///
/// # Examples
///
/// ```
/// use platform_auth::Caller;
///
/// let caller = Caller::new("alice", "acme");
/// assert_eq!(caller.to_string(), "alice@acme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    /// Subject identifier
    pub subject: String,

    /// Domain the request acts in
    pub domain: String,
}

impl Caller {
    /// Create a caller.
    pub fn new(subject: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            domain: domain.into(),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.subject, self.domain)
    }
}

/// Transport-neutral view of an incoming request.
///
/// Header names are case-insensitive. Upstream middleware that has already
/// authenticated the request can attach the [`Caller`] directly.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: HashMap<String, String>,
    caller: Option<Caller>,
}

impl RequestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Attach an already authenticated caller.
    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Look up a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The attached caller, if any.
    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    /// The token of an `Authorization: Bearer <token>` header.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.header("authorization")?;
        let (scheme, token) = value.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    }
}

/// Identifies the caller of a request.
///
/// Implementations must fail with an unauthenticated error rather than
/// return a caller with an empty subject.
pub trait ContextExtractor: Send + Sync {
    /// The request type this extractor reads.
    type Request;

    /// Extract the caller from a request.
    fn extract_caller(&self, request: &Self::Request) -> AuthResult<Caller>;
}

/// Trusts a caller attached to the request by upstream middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreAuthenticatedExtractor;

impl ContextExtractor for PreAuthenticatedExtractor {
    type Request = RequestContext;

    fn extract_caller(&self, request: &RequestContext) -> AuthResult<Caller> {
        match request.caller() {
            Some(caller) if !caller.subject.trim().is_empty() => Ok(caller.clone()),
            Some(_) => Err(AuthError::Unauthenticated("empty subject".to_string())),
            None => Err(AuthError::Unauthenticated(
                "no caller attached to request".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive() {
        let ctx = RequestContext::new().with_header("X-Tenant-ID", "acme");
        assert_eq!(ctx.header("x-tenant-id"), Some("acme"));
        assert_eq!(ctx.header("X-TENANT-ID"), Some("acme"));
        assert_eq!(ctx.header("x-other"), None);
    }

    #[test]
    fn test_bearer_token() {
        let ctx = RequestContext::new().with_header("Authorization", "Bearer abc.def.ghi");
        assert_eq!(ctx.bearer_token(), Some("abc.def.ghi"));

        let basic = RequestContext::new().with_header("Authorization", "Basic dXNlcg==");
        assert_eq!(basic.bearer_token(), None);

        let empty = RequestContext::new().with_header("Authorization", "Bearer ");
        assert_eq!(empty.bearer_token(), None);
    }

    #[test]
    fn test_pre_authenticated_extractor() {
        let extractor = PreAuthenticatedExtractor;

        let ctx = RequestContext::new().with_caller(Caller::new("alice", "acme"));
        assert_eq!(
            extractor.extract_caller(&ctx).unwrap(),
            Caller::new("alice", "acme")
        );

        let anonymous = RequestContext::new();
        assert!(matches!(
            extractor.extract_caller(&anonymous),
            Err(AuthError::Unauthenticated(_))
        ));

        let blank = RequestContext::new().with_caller(Caller::new(" ", "acme"));
        assert!(extractor.extract_caller(&blank).is_err());
    }
}
