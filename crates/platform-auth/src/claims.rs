//! JWT claims identifying a caller
//!
//! A token names its subject and the tenant (domain) it acts in. Tokens
//! that may act in several tenants list them in `tenants`; the request
//! then picks one with the tenant header.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Standard JWT claims with tenant extensions.
///
/// # Example
///
/// ```rust
/// use platform_auth::claims::CallerClaims;
///
/// let claims = CallerClaims::new("alice", chrono::Duration::hours(1))
///     .with_tenant("acme")
///     .with_tenants(["acme", "globex"]);
///
/// assert!(claims.may_act_in("globex"));
/// assert!(!claims.may_act_in("initech"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerClaims {
    // Standard JWT claims (RFC 7519)
    /// Subject
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    // Tenant claims
    /// Default tenant for requests made with this token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// Every tenant the token may act in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tenants: Vec<String>,

    /// Custom claims for extensibility
    #[serde(default, flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl CallerClaims {
    /// Create claims for a subject valid for `duration`.
    ///
    /// Issuer and audience default to the values [`crate::JwtConfig`]
    /// validates against by default.
    pub fn new(subject: impl Into<String>, duration: chrono::Duration) -> Self {
        let now = Utc::now();
        let exp = now + duration;

        Self {
            sub: subject.into(),
            iss: crate::DEFAULT_ISSUER.to_string(),
            aud: vec![crate::DEFAULT_AUDIENCE.to_string()],
            exp: exp.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::now_v7().to_string(),
            tenant: None,
            tenants: Vec::new(),
            custom: HashMap::new(),
        }
    }

    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Get expiration as DateTime.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    /// Check whether the token may act in `domain`.
    pub fn may_act_in(&self, domain: &str) -> bool {
        self.tenant.as_deref() == Some(domain) || self.tenants.iter().any(|t| t == domain)
    }

    /// Set the default tenant.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Set the tenants the token may act in.
    pub fn with_tenants<I, S>(mut self, tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenants = tenants.into_iter().map(Into::into).collect();
        self
    }

    /// Set the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.iss = issuer.into();
        self
    }

    /// Set the audience.
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.aud = audience;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_creation() {
        let claims = CallerClaims::new("alice", Duration::hours(1));

        assert_eq!(claims.sub, "alice");
        assert!(claims.tenant.is_none());
        assert!(!claims.is_expired());
        assert!(claims.expires_at() > Utc::now());
    }

    #[test]
    fn test_claims_expiration() {
        let mut claims = CallerClaims::new("alice", Duration::hours(1));
        claims.exp = Utc::now().timestamp() - 3600;

        assert!(claims.is_expired());
    }

    #[test]
    fn test_tenant_claims_round_trip_through_json() {
        let claims = CallerClaims::new("alice", Duration::hours(1))
            .with_tenant("acme")
            .with_tenants(["acme", "globex"]);
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["tenant"], "acme");
        let decoded: CallerClaims = serde_json::from_value(json).unwrap();
        assert!(decoded.may_act_in("acme"));
        assert!(decoded.may_act_in("globex"));
    }

    #[test]
    fn test_missing_tenant_claims_default() {
        let decoded: CallerClaims = serde_json::from_str(
            r#"{"sub":"svc","iss":"relay-authz","aud":["relay"],"exp":0,"iat":0,"nbf":0,"jti":"1"}"#,
        )
        .unwrap();
        assert!(decoded.tenant.is_none());
        assert!(decoded.tenants.is_empty());
        assert!(!decoded.may_act_in(""));
    }
}
