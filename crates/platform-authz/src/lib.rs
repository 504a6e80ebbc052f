//! # Platform Authz
//!
//! This crate provides the multi-tenant authorization engine of the Relay
//! platform: it answers "may this subject perform this action on this
//! resource in this domain?" from an in-memory cache of policy.
//!
//! ## Overview
//!
//! The platform-authz crate handles:
//! - **Policy Store**: The durable source of rules, assignments, and edges
//! - **Role Hierarchy**: Transitive role inheritance with cycle detection
//! - **Policy Cache**: Immutable per-domain snapshots, swapped atomically
//! - **Enforcer**: Default-deny, allow-list decisions with `*` wildcards
//! - **Refresh**: Retried store reads, stale-but-available on failure
//! - **Admin**: The only mutation path, with change notifications
//!
//! ## Architecture
//!
//! ```text
//!   PolicyAdmin ──write──► PolicyStore ◄──read (retried)── CacheRefresher
//!        │                                                      │
//!        └──refresh──────────────────────────────────────────►──┤
//!        └──PolicyEvent──► EventBus ──► PolicyChangeHandler ──►─┘
//!                                        (other instances)      │
//!                                                        publish snapshot
//!                                                               ▼
//!   Enforcer ──────────────── view(domain) ─────────────► PolicyCache
//! ```
//!
//! Enforcement never reads the store. A domain that has never been loaded
//! is served as empty, so every request in it is denied.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use platform_authz::{AuthzConfig, AuthzEngine, MemoryPolicyStore};
//! use platform_rbac::{PolicyRule, RoleAssignment, RoleHierarchyEdge};
//!
//! async fn example() -> Result<(), platform_authz::AuthzError> {
//!     let engine = AuthzEngine::new(Arc::new(MemoryPolicyStore::new()), AuthzConfig::from_env())?;
//!     engine.bootstrap().await?;
//!
//!     let admin = engine.admin();
//!     admin.add_rule(PolicyRule::new("acme", "viewer", "doc", "read")?).await?;
//!     admin.add_hierarchy_edge(RoleHierarchyEdge::new("acme", "editor", "viewer")?).await?;
//!     admin.assign_role(RoleAssignment::new("acme", "alice", "editor")?).await?;
//!
//!     assert!(engine.enforcer().enforce("alice", "acme", "doc", "read").is_allowed());
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod cache;
pub mod config;
pub mod enforcer;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod refresh;
pub mod retry;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use admin::PolicyAdmin;
pub use cache::{CacheStats, PolicyCache, PolicyView};
pub use config::AuthzConfig;
pub use enforcer::{Decision, DenyReason, Enforcer, Explanation};
pub use engine::AuthzEngine;
pub use error::{AuthzError, AuthzResult};
pub use hierarchy::{RoleHierarchy, RoleSet};
pub use refresh::{CacheRefresher, PolicyChangeHandler, RefreshSummary};
pub use retry::RetryConfig;
pub use snapshot::DomainSnapshot;
pub use store::{MemoryPolicyStore, PolicyStore};
