//! Access decisions
//!
//! A request is allowed only if some role held by the subject in the
//! requested domain, directly or by inheritance, is granted a rule that
//! matches both the resource and the action. Everything else is denied.
//! Enforcement reads cached snapshots only; it performs no I/O and never
//! fails.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use platform_rbac::PolicyRule;

use crate::cache::PolicyCache;
use crate::hierarchy::RoleSet;

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Access granted
    Allow,
    /// Access denied
    Deny,
}

impl Decision {
    /// Check if access is granted.
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
        }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The subject holds no role in the domain
    NoRoleAssignment,
    /// No rule of any held role matches the request
    NoMatchingRule,
}

/// Full account of a decision, for audit logs.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    /// The decision
    pub decision: Decision,
    /// Subject that made the request
    pub subject: String,
    /// Requested domain
    pub domain: String,
    /// Requested resource
    pub resource: String,
    /// Requested action
    pub action: String,
    /// Roles assigned directly in the domain
    pub assigned_roles: Vec<String>,
    /// Assigned roles plus everything they inherit
    pub expanded_roles: RoleSet,
    /// The rule that granted access
    pub matched_rule: Option<PolicyRule>,
    /// Whether the global rule set was consulted instead of the domain's
    pub used_global_rules: bool,
    /// Version of the domain snapshot the decision was made against
    pub snapshot_version: u64,
    /// Set when the decision is a denial
    pub deny_reason: Option<DenyReason>,
}

/// Evaluates requests against the policy cache.
///
/// Cheap to clone; all clones share one cache.
#[derive(Debug, Clone)]
pub struct Enforcer {
    cache: Arc<PolicyCache>,
}

impl Enforcer {
    /// Create an enforcer over a cache.
    pub fn new(cache: Arc<PolicyCache>) -> Self {
        Self { cache }
    }

    /// Decide whether `subject` may perform `action` on `resource` in `domain`.
    ///
    /// The request values are matched literally: only rules carry wildcards.
    pub fn enforce(&self, subject: &str, domain: &str, resource: &str, action: &str) -> Decision {
        self.explain(subject, domain, resource, action).decision
    }

    /// Decide a request and report how the decision was reached.
    pub fn explain(
        &self,
        subject: &str,
        domain: &str,
        resource: &str,
        action: &str,
    ) -> Explanation {
        let view = self.cache.view(domain);
        let (rules, used_global_rules) = view.rule_source();

        let assigned_roles = view.domain.assigned_roles(subject).to_vec();
        let expanded_roles = view.domain.expanded_roles(subject);

        let matched_rule = expanded_roles
            .iter()
            .flat_map(|role| rules.rules_for_role(role))
            .find(|rule| rule.grants(resource, action))
            .cloned();

        let (decision, deny_reason) = match (&matched_rule, assigned_roles.is_empty()) {
            (Some(_), _) => (Decision::Allow, None),
            (None, true) => (Decision::Deny, Some(DenyReason::NoRoleAssignment)),
            (None, false) => (Decision::Deny, Some(DenyReason::NoMatchingRule)),
        };

        tracing::trace!(
            subject,
            domain,
            resource,
            action,
            decision = %decision,
            version = view.domain.version(),
            global_rules = used_global_rules,
            "Access decision"
        );

        Explanation {
            decision,
            subject: subject.to_string(),
            domain: domain.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
            assigned_roles,
            expanded_roles,
            matched_rule,
            used_global_rules,
            snapshot_version: view.domain.version(),
            deny_reason,
        }
    }

    /// Roles a subject holds in a domain, including inherited ones.
    pub fn roles_for(&self, subject: &str, domain: &str) -> RoleSet {
        self.cache.view(domain).domain.expanded_roles(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::DomainSnapshot;
    use platform_rbac::{RoleAssignment, RoleHierarchyEdge};

    fn enforcer_with(
        domain: &str,
        rules: &[(&str, &str, &str)],
        assignments: &[(&str, &str)],
        edges: &[(&str, &str)],
    ) -> (Enforcer, Arc<PolicyCache>) {
        let cache = Arc::new(PolicyCache::new());
        publish(&cache, domain, rules, assignments, edges);
        (Enforcer::new(Arc::clone(&cache)), cache)
    }

    fn publish(
        cache: &PolicyCache,
        domain: &str,
        rules: &[(&str, &str, &str)],
        assignments: &[(&str, &str)],
        edges: &[(&str, &str)],
    ) {
        let snapshot = DomainSnapshot::build(
            domain,
            cache.version(domain) + 1,
            rules
                .iter()
                .map(|(r, res, act)| PolicyRule::new(domain, *r, *res, *act).unwrap())
                .collect(),
            assignments
                .iter()
                .map(|(s, r)| RoleAssignment::new(domain, *s, *r).unwrap())
                .collect(),
            edges
                .iter()
                .map(|(c, p)| RoleHierarchyEdge::new(domain, *c, *p).unwrap())
                .collect(),
        )
        .unwrap();
        cache.publish(snapshot);
    }

    #[test]
    fn test_inherited_permission_allows() {
        let (enforcer, _) = enforcer_with(
            "acme",
            &[("viewer", "doc", "read"), ("editor", "doc", "write")],
            &[("alice", "editor")],
            &[("editor", "viewer")],
        );

        assert_eq!(enforcer.enforce("alice", "acme", "doc", "read"), Decision::Allow);
        assert_eq!(enforcer.enforce("alice", "acme", "doc", "write"), Decision::Allow);
        assert_eq!(enforcer.enforce("alice", "acme", "doc", "delete"), Decision::Deny);
    }

    #[test]
    fn test_no_assignment_denies() {
        let (enforcer, _) = enforcer_with("acme", &[("viewer", "*", "*")], &[], &[]);
        let explanation = enforcer.explain("bob", "acme", "doc", "read");
        assert_eq!(explanation.decision, Decision::Deny);
        assert_eq!(explanation.deny_reason, Some(DenyReason::NoRoleAssignment));
    }

    #[test]
    fn test_assignments_do_not_cross_domains() {
        let (enforcer, cache) = enforcer_with(
            "acme",
            &[("viewer", "doc", "read")],
            &[("alice", "viewer")],
            &[],
        );
        publish(&cache, "globex", &[("viewer", "doc", "read")], &[], &[]);

        assert!(enforcer.enforce("alice", "acme", "doc", "read").is_allowed());
        assert!(!enforcer.enforce("alice", "globex", "doc", "read").is_allowed());
    }

    #[test]
    fn test_wildcards_match_any_value() {
        let (enforcer, _) = enforcer_with(
            "acme",
            &[("admin", "*", "*"), ("auditor", "*", "read")],
            &[("root", "admin"), ("carol", "auditor")],
            &[],
        );

        assert!(enforcer.enforce("root", "acme", "anything", "delete").is_allowed());
        assert!(enforcer.enforce("carol", "acme", "invoice", "read").is_allowed());
        assert!(!enforcer.enforce("carol", "acme", "invoice", "write").is_allowed());
    }

    #[test]
    fn test_request_wildcard_is_literal() {
        let (enforcer, _) = enforcer_with(
            "acme",
            &[("viewer", "doc", "read")],
            &[("alice", "viewer")],
            &[],
        );
        assert!(!enforcer.enforce("alice", "acme", "*", "read").is_allowed());
        assert!(!enforcer.enforce("alice", "acme", "doc", "*").is_allowed());
    }

    #[test]
    fn test_global_rules_apply_when_domain_has_none() {
        let (enforcer, cache) = enforcer_with("", &[("member", "profile", "read")], &[], &[]);
        publish(&cache, "globex", &[], &[("dave", "member")], &[]);

        let explanation = enforcer.explain("dave", "globex", "profile", "read");
        assert_eq!(explanation.decision, Decision::Allow);
        assert!(explanation.used_global_rules);
    }

    #[test]
    fn test_domain_rules_shadow_global_rules() {
        let (enforcer, cache) = enforcer_with("", &[("member", "profile", "read")], &[], &[]);
        publish(
            &cache,
            "acme",
            &[("viewer", "doc", "read")],
            &[("dave", "member")],
            &[],
        );

        let explanation = enforcer.explain("dave", "acme", "profile", "read");
        assert_eq!(explanation.decision, Decision::Deny);
        assert_eq!(explanation.deny_reason, Some(DenyReason::NoMatchingRule));
        assert!(!explanation.used_global_rules);
    }

    #[test]
    fn test_explain_reports_matched_rule() {
        let (enforcer, _) = enforcer_with(
            "acme",
            &[("viewer", "doc", "read")],
            &[("alice", "editor")],
            &[("editor", "viewer")],
        );
        let explanation = enforcer.explain("alice", "acme", "doc", "read");
        assert_eq!(explanation.assigned_roles, vec!["editor".to_string()]);
        assert!(explanation.expanded_roles.contains("viewer"));
        assert_eq!(
            explanation.matched_rule.map(|r| r.role().to_string()),
            Some("viewer".to_string())
        );
        assert_eq!(explanation.snapshot_version, 1);
    }

    #[test]
    fn test_roles_for() {
        let (enforcer, _) = enforcer_with(
            "acme",
            &[],
            &[("alice", "admin")],
            &[("admin", "editor"), ("editor", "viewer")],
        );
        assert_eq!(enforcer.roles_for("alice", "acme").len(), 3);
        assert!(enforcer.roles_for("alice", "globex").is_empty());
    }
}
