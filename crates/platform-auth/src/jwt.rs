//! JWT caller extraction
//!
//! This module validates `Authorization: Bearer` tokens with the
//! jsonwebtoken crate and turns their claims into a [`Caller`]. HMAC
//! algorithms (HS256, HS384, HS512) are supported.

use crate::claims::CallerClaims;
use crate::context::{Caller, ContextExtractor, RequestContext};
use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};

/// JWT configuration for token validation.
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC algorithms
    pub secret: Option<String>,

    /// Algorithm to use
    pub algorithm: JwtAlgorithm,

    /// Expected token issuer
    pub issuer: String,

    /// Accepted token audiences
    pub audience: Vec<String>,

    /// Header that selects a tenant among the token's `tenants`
    pub tenant_header: String,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("tenant_header", &self.tenant_header)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            algorithm: JwtAlgorithm::HS256,
            issuer: crate::DEFAULT_ISSUER.to_string(),
            audience: vec![crate::DEFAULT_AUDIENCE.to_string()],
            tenant_header: "x-tenant-id".to_string(),
            leeway_secs: 30,
        }
    }
}

impl JwtConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AUTH_JWT_SECRET`: HMAC secret (required)
    /// - `AUTH_JWT_ISSUER`: Expected issuer (default: relay-authz)
    /// - `AUTH_JWT_AUDIENCE`: Comma-separated accepted audiences (default: relay)
    /// - `AUTH_TENANT_HEADER`: Tenant selection header (default: x-tenant-id)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            secret: std::env::var("AUTH_JWT_SECRET").ok(),
            issuer: std::env::var("AUTH_JWT_ISSUER").unwrap_or(default.issuer),
            audience: std::env::var("AUTH_JWT_AUDIENCE")
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(default.audience),
            tenant_header: std::env::var("AUTH_TENANT_HEADER").unwrap_or(default.tenant_header),
            ..default
        }
    }

    /// Reject values the extractor cannot run with.
    pub fn validate(&self) -> AuthResult<()> {
        match &self.secret {
            Some(secret) if !secret.is_empty() => {}
            _ => {
                return Err(AuthError::ConfigError(
                    "AUTH_JWT_SECRET is required for HMAC".to_string(),
                ))
            }
        }
        if self.audience.is_empty() {
            return Err(AuthError::ConfigError(
                "AUTH_JWT_AUDIENCE must name at least one audience".to_string(),
            ));
        }
        if self.tenant_header.trim().is_empty() {
            return Err(AuthError::ConfigError(
                "AUTH_TENANT_HEADER must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Supported JWT algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
        }
    }
}

/// Identifies callers from bearer tokens.
pub struct JwtContextExtractor {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtContextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtContextExtractor")
            .field("config", &self.config)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl JwtContextExtractor {
    /// Create an extractor with the given configuration.
    ///
    /// # Returns
    ///
    /// Extractor or configuration error
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        config.validate()?;
        let secret = config
            .secret
            .as_ref()
            .ok_or_else(|| AuthError::ConfigError("Secret required for HMAC".to_string()))?;
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
        })
    }

    /// Create with a simple secret (HS256) and default issuer and audience.
    pub fn with_secret(secret: impl Into<String>) -> AuthResult<Self> {
        Self::new(JwtConfig {
            secret: Some(secret.into()),
            ..Default::default()
        })
    }

    /// Encode claims into a signed token.
    pub fn encode_claims(&self, claims: &CallerClaims) -> AuthResult<String> {
        let header = Header::new(self.config.algorithm.into());
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token encoding failed: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> AuthResult<CallerClaims> {
        let mut validation = Validation::new(self.config.algorithm.into());
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&self.config.audience);
        validation.leeway = self.config.leeway_secs;
        validation.validate_nbf = true;

        let token_data: TokenData<CallerClaims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AuthError::InvalidToken("Malformed token".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("Invalid signature".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    AuthError::InvalidToken("Invalid issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    AuthError::InvalidToken("Invalid audience".to_string())
                }
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                    AuthError::InvalidToken("Token not yet valid".to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    /// Get the configuration.
    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Pick the domain a request acts in.
    ///
    /// The tenant header wins when the token lists it; otherwise the
    /// token's own tenant, or its only listed tenant.
    fn resolve_domain(&self, claims: &CallerClaims, request: &RequestContext) -> AuthResult<String> {
        if let Some(requested) = request.header(&self.config.tenant_header) {
            if claims.may_act_in(requested) {
                return Ok(requested.to_string());
            }
            return Err(AuthError::Unauthenticated(format!(
                "token is not valid for tenant {:?}",
                requested
            )));
        }

        match (&claims.tenant, claims.tenants.as_slice()) {
            (Some(tenant), _) => Ok(tenant.clone()),
            (None, [only]) => Ok(only.clone()),
            _ => Err(AuthError::MissingClaim("tenant".to_string())),
        }
    }
}

impl ContextExtractor for JwtContextExtractor {
    type Request = RequestContext;

    fn extract_caller(&self, request: &RequestContext) -> AuthResult<Caller> {
        let token = request
            .bearer_token()
            .ok_or_else(|| AuthError::Unauthenticated("missing bearer token".to_string()))?;
        let claims = self.validate_token(token)?;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::MissingClaim("sub".to_string()));
        }
        let domain = self.resolve_domain(&claims, request)?;

        Ok(Caller::new(claims.sub, domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn extractor() -> JwtContextExtractor {
        JwtContextExtractor::with_secret("test-secret-key-with-enough-length").unwrap()
    }

    fn request(token: &str) -> RequestContext {
        RequestContext::new().with_header("Authorization", format!("Bearer {}", token))
    }

    #[test]
    fn test_token_round_trip() {
        let extractor = extractor();
        let claims = CallerClaims::new("alice", Duration::hours(1)).with_tenant("acme");

        let token = extractor.encode_claims(&claims).unwrap();
        let decoded = extractor.validate_token(&token).unwrap();

        assert_eq!(decoded.sub, "alice");
        assert_eq!(decoded.tenant.as_deref(), Some("acme"));
    }

    #[test]
    fn test_extracts_caller_from_tenant_claim() {
        let extractor = extractor();
        let token = extractor
            .encode_claims(&CallerClaims::new("alice", Duration::hours(1)).with_tenant("acme"))
            .unwrap();

        let caller = extractor.extract_caller(&request(&token)).unwrap();
        assert_eq!(caller, Caller::new("alice", "acme"));
    }

    #[test]
    fn test_tenant_header_selects_listed_tenant() {
        let extractor = extractor();
        let claims = CallerClaims::new("alice", Duration::hours(1))
            .with_tenant("acme")
            .with_tenants(["acme", "globex"]);
        let token = extractor.encode_claims(&claims).unwrap();

        let caller = extractor
            .extract_caller(&request(&token).with_header("X-Tenant-Id", "globex"))
            .unwrap();
        assert_eq!(caller.domain, "globex");

        let result = extractor.extract_caller(&request(&token).with_header("X-Tenant-Id", "initech"));
        assert!(matches!(result, Err(AuthError::Unauthenticated(_))));
    }

    #[test]
    fn test_missing_tenant_is_rejected() {
        let extractor = extractor();
        let token = extractor
            .encode_claims(&CallerClaims::new("alice", Duration::hours(1)))
            .unwrap();

        assert!(matches!(
            extractor.extract_caller(&request(&token)),
            Err(AuthError::MissingClaim(_))
        ));
    }

    #[test]
    fn test_missing_bearer_is_unauthenticated() {
        let result = extractor().extract_caller(&RequestContext::new());
        assert!(matches!(result, Err(AuthError::Unauthenticated(_))));
    }

    #[test]
    fn test_expired_token() {
        let extractor = extractor();
        let mut claims = CallerClaims::new("alice", Duration::hours(1)).with_tenant("acme");
        claims.exp = chrono::Utc::now().timestamp() - 3600;
        let token = extractor.encode_claims(&claims).unwrap();

        assert!(matches!(
            extractor.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = extractor()
            .encode_claims(&CallerClaims::new("alice", Duration::hours(1)).with_tenant("acme"))
            .unwrap();
        let other = JwtContextExtractor::with_secret("another-secret-key-entirely").unwrap();

        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_config_requires_secret() {
        assert!(matches!(
            JwtContextExtractor::new(JwtConfig::default()),
            Err(AuthError::ConfigError(_))
        ));
    }
}
