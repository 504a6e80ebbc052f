//! # Platform Events
//!
//! This crate provides the policy change notification bus for the Relay
//! authorization engine, so that every engine instance sharing a policy
//! store learns when a tenant's rules change.
//!
//! ## Overview
//!
//! The platform-events crate handles:
//! - **Event Envelope**: Routing, tracing, and origin metadata
//! - **Policy Events**: Strongly-typed rule, assignment, and hierarchy changes
//! - **Event Bus**: Publish/subscribe messaging
//! - **Event Handlers**: Async event processing (e.g. cache refresh)
//!
//! ## Features
//!
//! - `memory` (default): In-memory event bus for single-process deployments
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust,no_run
//! use platform_events::{EventBus, MemoryEventBus, PolicyEvent};
//! use platform_rbac::PolicyRule;
//!
//! async fn publish_example() {
//!     let bus = MemoryEventBus::new();
//!
//!     let rule = PolicyRule::new("acme", "viewer", "doc", "read").unwrap();
//!     let event = PolicyEvent::RuleAdded { rule };
//!
//!     bus.publish(event.to_event()).await.unwrap();
//! }
//! ```
//!
//! ### Subscribing to Events
//!
//! ```rust,no_run
//! use platform_events::{EventBus, MemoryEventBus, PolicyEvent};
//!
//! async fn subscribe_example() {
//!     let bus = MemoryEventBus::new();
//!
//!     // Subscribe to every rule change
//!     let mut sub = bus.subscribe("authz.rule.*").await.unwrap();
//!
//!     while let Ok(event) = sub.recv().await {
//!         if let Some(change) = PolicyEvent::from_event(&event) {
//!             println!("{} changed in domain {:?}", event.topic(), change.domain());
//!         }
//!     }
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are structured as `authz.{kind}.{change}`:
//! - `authz.rule.added` - Specific event
//! - `authz.rule.*` - All rule events
//! - `authz.#` - All authorization events
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventBusError, EventBusResult, EventBusStats, EventHandler, MemoryEventBus, Subscription};
pub use types::{mutation_topics, Event, PolicyEvent, TOPIC_NAMESPACE};
