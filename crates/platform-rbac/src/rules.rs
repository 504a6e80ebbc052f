//! # Policy tuples
//!
//! The three tuple kinds persisted by a policy store. All of them are
//! immutable once created; a change is a removal followed by an insertion.
//! Equality and hashing cover the full tuple, which is also its identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{check_characters, require, ModelError, ModelResult};
use crate::pattern::Pattern;

/// A rule granting `role` the right to perform `action` on `resource`
/// within `domain`.
///
/// The subject is always a role, never a raw user identifier.
///
/// # Example
///
/// ```
/// use platform_rbac::PolicyRule;
///
/// let rule = PolicyRule::new("acme", "editor", "doc", "*").unwrap();
/// assert!(rule.grants("doc", "write"));
/// assert!(!rule.grants("invoice", "write"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    domain: String,
    role: String,
    resource: Pattern,
    action: Pattern,
}

impl PolicyRule {
    /// Create a validated rule.
    ///
    /// # Arguments
    ///
    /// * `domain` - Tenant domain, or `""` for the global domain
    /// * `role` - Role the rule grants to
    /// * `resource` - Resource literal or `*`
    /// * `action` - Action literal or `*`
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if role, resource or action is empty or if
    /// any field carries control characters or surrounding whitespace.
    pub fn new(
        domain: impl Into<String>,
        role: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> ModelResult<Self> {
        let rule = Self {
            domain: domain.into(),
            role: role.into(),
            resource: Pattern::from(resource.into()),
            action: Pattern::from(action.into()),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Re-check the tuple's shape.
    ///
    /// Rules that arrive through deserialization skip [`PolicyRule::new`],
    /// so consumers loading from external storage should call this.
    pub fn validate(&self) -> ModelResult<()> {
        check_characters("domain", &self.domain)?;
        require("role", &self.role)?;
        require("resource", self.resource.as_str())?;
        require("action", self.action.as_str())
    }

    /// The rule's domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The role this rule grants to.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The resource pattern.
    pub fn resource(&self) -> &Pattern {
        &self.resource
    }

    /// The action pattern.
    pub fn action(&self) -> &Pattern {
        &self.action
    }

    /// Check whether this rule covers a concrete resource and action.
    ///
    /// Role and domain are not considered here.
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.resource.matches(resource) && self.action.matches(action)
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p({:?}, {}, {}, {})",
            self.domain, self.role, self.resource, self.action
        )
    }
}

/// Binds a subject (user) to a role within one domain.
///
/// The same subject may hold different roles in different domains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAssignment {
    domain: String,
    subject: String,
    role: String,
}

impl RoleAssignment {
    /// Create a validated role assignment.
    pub fn new(
        domain: impl Into<String>,
        subject: impl Into<String>,
        role: impl Into<String>,
    ) -> ModelResult<Self> {
        let assignment = Self {
            domain: domain.into(),
            subject: subject.into(),
            role: role.into(),
        };
        assignment.validate()?;
        Ok(assignment)
    }

    /// Re-check the tuple's shape.
    pub fn validate(&self) -> ModelResult<()> {
        check_characters("domain", &self.domain)?;
        require("subject", &self.subject)?;
        require("role", &self.role)
    }

    /// The assignment's domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The subject holding the role.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The role held.
    pub fn role(&self) -> &str {
        &self.role
    }
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g({:?}, {}, {})", self.domain, self.subject, self.role)
    }
}

/// Declares that `child` inherits every permission of `parent` within a
/// domain.
///
/// # Example
///
/// ```
/// use platform_rbac::RoleHierarchyEdge;
///
/// let edge = RoleHierarchyEdge::new("acme", "editor", "viewer").unwrap();
/// assert_eq!(edge.parent(), "viewer");
///
/// assert!(RoleHierarchyEdge::new("acme", "editor", "editor").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleHierarchyEdge {
    domain: String,
    child: String,
    parent: String,
}

impl RoleHierarchyEdge {
    /// Create a validated hierarchy edge.
    ///
    /// # Errors
    ///
    /// Besides the field checks, an edge from a role to itself is rejected
    /// with [`ModelError::SelfInheritance`].
    pub fn new(
        domain: impl Into<String>,
        child: impl Into<String>,
        parent: impl Into<String>,
    ) -> ModelResult<Self> {
        let edge = Self {
            domain: domain.into(),
            child: child.into(),
            parent: parent.into(),
        };
        edge.validate()?;
        Ok(edge)
    }

    /// Re-check the tuple's shape.
    pub fn validate(&self) -> ModelResult<()> {
        check_characters("domain", &self.domain)?;
        require("child", &self.child)?;
        require("parent", &self.parent)?;
        if self.child == self.parent {
            return Err(ModelError::SelfInheritance {
                role: self.child.clone(),
            });
        }
        Ok(())
    }

    /// The edge's domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The inheriting role.
    pub fn child(&self) -> &str {
        &self.child
    }

    /// The inherited role.
    pub fn parent(&self) -> &str {
        &self.parent
    }
}

impl fmt::Display for RoleHierarchyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h({:?}, {} -> {})", self.domain, self.child, self.parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rule_creation() {
        let rule = PolicyRule::new("acme", "viewer", "doc", "read").unwrap();
        assert_eq!(rule.domain(), "acme");
        assert_eq!(rule.role(), "viewer");
        assert_eq!(rule.resource(), &Pattern::Literal("doc".to_string()));
        assert!(!rule.action().is_wildcard());
    }

    #[test]
    fn test_rule_global_domain_allowed() {
        let rule = PolicyRule::new("", "member", "profile", "read").unwrap();
        assert!(crate::is_global(rule.domain()));
    }

    #[test]
    fn test_rule_rejects_malformed_fields() {
        assert_eq!(
            PolicyRule::new("acme", "", "doc", "read"),
            Err(ModelError::EmptyField { field: "role" })
        );
        assert!(PolicyRule::new("acme", "viewer", "", "read").is_err());
        assert!(PolicyRule::new("acme", "viewer", "doc", "").is_err());
        assert!(PolicyRule::new("ac\tme", "viewer", "doc", "read").is_err());
    }

    #[test]
    fn test_rule_grants() {
        let rule = PolicyRule::new("acme", "viewer", "doc", "read").unwrap();
        assert!(rule.grants("doc", "read"));
        assert!(!rule.grants("doc", "delete"));
        assert!(!rule.grants("docs", "read"));

        let any_action = PolicyRule::new("acme", "editor", "doc", "*").unwrap();
        assert!(any_action.grants("doc", "delete"));
        assert!(!any_action.grants("invoice", "delete"));
    }

    #[test]
    fn test_rule_identity_is_full_tuple() {
        let mut set = HashSet::new();
        set.insert(PolicyRule::new("acme", "viewer", "doc", "read").unwrap());
        set.insert(PolicyRule::new("acme", "viewer", "doc", "read").unwrap());
        set.insert(PolicyRule::new("other", "viewer", "doc", "read").unwrap());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_deserialized_rule_can_be_revalidated() {
        let json = r#"{"domain":"acme","role":"","resource":"doc","action":"read"}"#;
        let rule: PolicyRule = serde_json::from_str(json).unwrap();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_assignment() {
        let a = RoleAssignment::new("acme", "alice", "editor").unwrap();
        assert_eq!(a.subject(), "alice");
        assert_eq!(a.role(), "editor");
        assert!(RoleAssignment::new("acme", "", "editor").is_err());
    }

    #[test]
    fn test_edge_rejects_self_inheritance() {
        assert_eq!(
            RoleHierarchyEdge::new("acme", "admin", "admin"),
            Err(ModelError::SelfInheritance {
                role: "admin".to_string()
            })
        );
    }

    #[test]
    fn test_display() {
        let rule = PolicyRule::new("acme", "admin", "*", "*").unwrap();
        assert_eq!(rule.to_string(), "p(\"acme\", admin, *, *)");
    }
}
