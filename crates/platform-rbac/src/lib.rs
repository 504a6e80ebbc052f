//! # Platform RBAC (Role-Based Access Control)
//!
//! This crate provides the policy data model shared by the Relay platform's
//! multi-tenant authorization engine.
//!
//! ## Overview
//!
//! The platform-rbac crate handles:
//! - **Rules**: `(domain, role, resource, action)` tuples granting access
//! - **Role Assignments**: `(domain, subject, role)` tuples binding callers to roles
//! - **Role Hierarchy Edges**: `(domain, child, parent)` inheritance declarations
//! - **Permissions**: `(resource, action)` pairs requested by operations
//! - **Patterns**: literal or wildcard matching of resources and actions
//!
//! ## Architecture
//!
//! ```text
//! Subject ──RoleAssignment──► Role ──RoleHierarchyEdge──► Parent Role
//!                              │                              │
//!                              └──────────PolicyRule──────────┘
//!                                   (domain, role, resource, action)
//!
//! Examples:
//!   ("acme", "viewer", "doc", "read")   - viewers in acme may read docs
//!   ("acme", "admin",  "*",   "*")      - admins in acme may do anything
//!   ("",     "member", "profile", "read") - platform-wide default
//! ```
//!
//! ## Domains
//!
//! Every tuple is partitioned by domain (tenant). The empty domain
//! [`GLOBAL_DOMAIN`] holds platform-wide default rules, consulted only for
//! domains that define no rules of their own.
//!
//! ## Usage
//!
//! ```rust
//! use platform_rbac::{Permission, PolicyRule};
//!
//! let rule = PolicyRule::new("acme", "viewer", "doc", "read").unwrap();
//! assert!(rule.grants("doc", "read"));
//! assert!(!rule.grants("doc", "delete"));
//!
//! let admin = PolicyRule::new("acme", "admin", "*", "*").unwrap();
//! assert!(admin.grants("invoice", "approve"));
//!
//! let perm = Permission::parse("doc:read").unwrap();
//! assert_eq!(perm.to_string(), "doc:read");
//! ```

pub mod error;
pub mod pattern;
pub mod permissions;
pub mod rules;

// Re-export main types for convenience
pub use error::ModelError;
pub use pattern::{Pattern, WILDCARD};
pub use permissions::Permission;
pub use rules::{PolicyRule, RoleAssignment, RoleHierarchyEdge};

/// The reserved global domain.
///
/// Rules defined here apply to any domain that has no rules of its own.
pub const GLOBAL_DOMAIN: &str = "";

/// Returns `true` if `domain` is the reserved global domain.
pub fn is_global(domain: &str) -> bool {
    domain == GLOBAL_DOMAIN
}
