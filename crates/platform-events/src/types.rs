//! Event types for policy change notification
//!
//! This module defines the envelope published on the bus and the typed
//! policy events carried inside it.

use chrono::{DateTime, Utc};
use platform_rbac::{PolicyRule, RoleAssignment, RoleHierarchyEdge};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Topic namespace for all authorization events.
pub const TOPIC_NAMESPACE: &str = "authz";

/// Event envelope.
///
/// All events are wrapped in this envelope which provides metadata
/// for routing, tracing, and processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "rule.added", "domain.refreshed")
    pub event_type: String,

    /// Domain (tenant) the event concerns
    pub domain: Option<String>,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Engine instance that emitted the event
    pub origin: Option<String>,

    /// Correlation ID for tracing
    pub correlation_id: Option<String>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type string
    /// * `payload` - The event payload
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            domain: None,
            timestamp: Utc::now(),
            origin: None,
            correlation_id: None,
            version: 1,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Set domain context.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the emitting instance.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get the topic for this event.
    ///
    /// Topics are structured as: `authz.{event_type}`
    pub fn topic(&self) -> String {
        format!("{}.{}", TOPIC_NAMESPACE, self.event_type)
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Changes to authorization state, and the cache's reaction to them.
///
/// Mutation variants are published by the administrative surface after
/// the store has accepted the write. Refresh variants are published by
/// the cache refresher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyEvent {
    /// A rule was inserted
    RuleAdded { rule: PolicyRule },
    /// A rule was deleted
    RuleRemoved { rule: PolicyRule },
    /// A subject was given a role
    RoleAssigned { assignment: RoleAssignment },
    /// A subject lost a role
    RoleUnassigned { assignment: RoleAssignment },
    /// A hierarchy edge was inserted
    HierarchyEdgeAdded { edge: RoleHierarchyEdge },
    /// A hierarchy edge was deleted
    HierarchyEdgeRemoved { edge: RoleHierarchyEdge },
    /// A domain's cached snapshot was replaced
    DomainRefreshed {
        domain: String,
        rules: usize,
        version: u64,
    },
    /// A domain refresh failed; the previous snapshot is still served
    RefreshFailed { domain: String, reason: String },
}

impl PolicyEvent {
    /// Get the event type string used in the topic.
    pub fn event_type(&self) -> &'static str {
        match self {
            PolicyEvent::RuleAdded { .. } => "rule.added",
            PolicyEvent::RuleRemoved { .. } => "rule.removed",
            PolicyEvent::RoleAssigned { .. } => "assignment.added",
            PolicyEvent::RoleUnassigned { .. } => "assignment.removed",
            PolicyEvent::HierarchyEdgeAdded { .. } => "hierarchy.added",
            PolicyEvent::HierarchyEdgeRemoved { .. } => "hierarchy.removed",
            PolicyEvent::DomainRefreshed { .. } => "domain.refreshed",
            PolicyEvent::RefreshFailed { .. } => "domain.refresh_failed",
        }
    }

    /// Get the domain this event concerns.
    pub fn domain(&self) -> &str {
        match self {
            PolicyEvent::RuleAdded { rule } | PolicyEvent::RuleRemoved { rule } => rule.domain(),
            PolicyEvent::RoleAssigned { assignment }
            | PolicyEvent::RoleUnassigned { assignment } => assignment.domain(),
            PolicyEvent::HierarchyEdgeAdded { edge }
            | PolicyEvent::HierarchyEdgeRemoved { edge } => edge.domain(),
            PolicyEvent::DomainRefreshed { domain, .. }
            | PolicyEvent::RefreshFailed { domain, .. } => domain,
        }
    }

    /// Check whether this event reports a change to stored policy.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            PolicyEvent::DomainRefreshed { .. } | PolicyEvent::RefreshFailed { .. }
        )
    }

    /// Convert to generic event.
    pub fn to_event(&self) -> Event {
        Event::new(
            self.event_type(),
            serde_json::to_value(self).unwrap_or_default(),
        )
        .with_domain(self.domain())
    }

    /// Recover a typed event from an envelope.
    ///
    /// Returns `None` for envelopes that do not carry a policy event.
    pub fn from_event(event: &Event) -> Option<Self> {
        event.parse_payload().ok()
    }
}

/// Topic patterns matching every policy mutation event.
pub fn mutation_topics() -> Vec<String> {
    ["rule.*", "assignment.*", "hierarchy.*"]
        .iter()
        .map(|suffix| format!("{}.{}", TOPIC_NAMESPACE, suffix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic() {
        let event = Event::new("rule.added", serde_json::json!({}));
        assert_eq!(event.topic(), "authz.rule.added");
        assert_eq!(event.version, 1);
    }

    #[test]
    fn test_policy_event_round_trip() {
        let rule = PolicyRule::new("acme", "viewer", "doc", "read").unwrap();
        let typed = PolicyEvent::RuleAdded { rule };
        let event = typed.to_event().with_origin("node-1");

        assert_eq!(event.topic(), "authz.rule.added");
        assert_eq!(event.domain.as_deref(), Some("acme"));
        assert_eq!(PolicyEvent::from_event(&event), Some(typed));
    }

    #[test]
    fn test_foreign_payload_is_ignored() {
        let event = Event::new("rule.added", serde_json::json!({"hello": "world"}));
        assert_eq!(PolicyEvent::from_event(&event), None);
    }

    #[test]
    fn test_mutation_classification() {
        let refreshed = PolicyEvent::DomainRefreshed {
            domain: "acme".to_string(),
            rules: 3,
            version: 2,
        };
        assert!(!refreshed.is_mutation());
        assert_eq!(refreshed.domain(), "acme");

        let edge = RoleHierarchyEdge::new("acme", "editor", "viewer").unwrap();
        assert!(PolicyEvent::HierarchyEdgeAdded { edge }.is_mutation());
    }

    #[test]
    fn test_mutation_topics() {
        assert_eq!(
            mutation_topics(),
            vec!["authz.rule.*", "authz.assignment.*", "authz.hierarchy.*"]
        );
    }
}
