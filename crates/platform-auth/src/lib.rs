//! # Platform Authentication
//!
//! This crate provides the access guard of the Relay authorization engine:
//! the integration point every protected operation passes through.
//!
//! ## Overview
//!
//! The platform-auth crate handles:
//! - **Callers**: Who is calling and in which domain (tenant)
//! - **Context Extraction**: From upstream middleware or a bearer JWT
//! - **Operation Metadata**: The permissions each operation requires
//! - **Access Guard**: Identity first, then every permission (AND)
//!
//! ## Features
//!
//! - `jwt` (default): Bearer token extraction using jsonwebtoken
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use platform_auth::{AccessGuard, Caller, OperationRegistry, PreAuthenticatedExtractor, RequestContext};
//! use platform_authz::{AuthzConfig, AuthzEngine, MemoryPolicyStore};
//!
//! async fn example() {
//!     let engine = AuthzEngine::new(Arc::new(MemoryPolicyStore::new()), AuthzConfig::from_env()).unwrap();
//!     engine.bootstrap().await.unwrap();
//!
//!     let registry = OperationRegistry::builder()
//!         .operation("documents.edit", [("doc", "read"), ("doc", "write")])
//!         .public("health")
//!         .build();
//!     let guard = AccessGuard::new(PreAuthenticatedExtractor, registry, engine.enforcer().clone());
//!
//!     let request = RequestContext::new().with_caller(Caller::new("alice", "acme"));
//!     match guard.check_operation(&request, "documents.edit") {
//!         Ok(caller) => println!("{} may edit", caller),
//!         Err(e) => println!("rejected with {}: {}", e.status_code(), e),
//!     }
//! }
//! ```
//!
//! ## Error Mapping
//!
//! - 401: no identity, bad or expired token
//! - 403: identity known, a required permission denied
//! - 500: operation not registered, configuration problems

pub mod claims;
pub mod context;
pub mod error;
pub mod guard;
#[cfg(feature = "jwt")]
pub mod jwt;

// Re-export main types
pub use claims::CallerClaims;
pub use context::{Caller, ContextExtractor, PreAuthenticatedExtractor, RequestContext};
pub use error::{AuthError, AuthResult};
pub use guard::{AccessGuard, MetadataProvider, OperationRegistry, OperationRegistryBuilder};

#[cfg(feature = "jwt")]
pub use jwt::{JwtAlgorithm, JwtConfig, JwtContextExtractor};

/// Issuer expected on caller tokens unless configured otherwise.
pub const DEFAULT_ISSUER: &str = "relay-authz";

/// Audience expected on caller tokens unless configured otherwise.
pub const DEFAULT_AUDIENCE: &str = "relay";
