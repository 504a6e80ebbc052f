//! Immutable per-domain policy snapshots
//!
//! A snapshot is everything enforcement needs for one domain, compiled
//! once from store data: rules indexed by role, roles indexed by subject,
//! and the inheritance closure of every role that can be reached from an
//! assignment. Snapshots are never modified; a refresh builds a new one.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use platform_rbac::{PolicyRule, RoleAssignment, RoleHierarchyEdge};

use crate::error::{AuthzError, AuthzResult};
use crate::hierarchy::{RoleHierarchy, RoleSet};

/// Compiled, read-only policy state of a single domain.
#[derive(Debug)]
pub struct DomainSnapshot {
    domain: String,
    version: u64,
    loaded_at: DateTime<Utc>,
    rules: Vec<PolicyRule>,
    /// role -> indices into `rules`
    grants: HashMap<String, Vec<usize>>,
    /// subject -> directly assigned roles
    assignments: HashMap<String, Vec<String>>,
    /// role -> memoized closure
    closures: HashMap<String, Arc<RoleSet>>,
    hierarchy: RoleHierarchy,
}

impl DomainSnapshot {
    /// A snapshot with no tuples, used for domains never loaded.
    pub fn empty(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            version: 0,
            loaded_at: Utc::now(),
            rules: Vec::new(),
            grants: HashMap::new(),
            assignments: HashMap::new(),
            closures: HashMap::new(),
            hierarchy: RoleHierarchy::default(),
        }
    }

    /// Compile a domain's tuples into a snapshot.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if any tuple is malformed or
    /// belongs to another domain, or if the hierarchy has a cycle. The
    /// caller keeps serving its previous snapshot in that case.
    pub fn build(
        domain: &str,
        version: u64,
        rules: Vec<PolicyRule>,
        assignments: Vec<RoleAssignment>,
        edges: Vec<RoleHierarchyEdge>,
    ) -> AuthzResult<Self> {
        let foreign = |kind: &str, other: &str| AuthzError::Configuration {
            domain: domain.to_string(),
            message: format!("{} for domain {:?} returned in this domain's data", kind, other),
        };

        let mut seen = HashSet::new();
        let mut unique_rules = Vec::with_capacity(rules.len());
        let mut grants: HashMap<String, Vec<usize>> = HashMap::new();
        for rule in rules {
            rule.validate()?;
            if rule.domain() != domain {
                return Err(foreign("rule", rule.domain()));
            }
            if !seen.insert(rule.clone()) {
                continue;
            }
            grants
                .entry(rule.role().to_string())
                .or_default()
                .push(unique_rules.len());
            unique_rules.push(rule);
        }

        let mut by_subject: HashMap<String, Vec<String>> = HashMap::new();
        for assignment in &assignments {
            assignment.validate()?;
            if assignment.domain() != domain {
                return Err(foreign("role assignment", assignment.domain()));
            }
            let roles = by_subject.entry(assignment.subject().to_string()).or_default();
            if !roles.iter().any(|r| r == assignment.role()) {
                roles.push(assignment.role().to_string());
            }
        }

        for edge in &edges {
            edge.validate()?;
            if edge.domain() != domain {
                return Err(foreign("hierarchy edge", edge.domain()));
            }
        }
        let hierarchy = RoleHierarchy::from_edges(domain, &edges);
        hierarchy.validate()?;

        // Memoize closures for every role enforcement can start from
        let mut closures = HashMap::new();
        let starting_roles = by_subject
            .values()
            .flatten()
            .map(String::as_str)
            .chain(hierarchy.children());
        for role in starting_roles {
            if !closures.contains_key(role) {
                closures.insert(role.to_string(), Arc::new(hierarchy.resolve(role)?));
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            version,
            loaded_at: Utc::now(),
            rules: unique_rules,
            grants,
            assignments: by_subject,
            closures,
            hierarchy,
        })
    }

    /// The domain this snapshot covers.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Monotonic version, bumped on every successful rebuild.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When the snapshot was compiled.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// All rules of the domain.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Check whether the domain defines any rules.
    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Number of subjects with at least one role.
    pub fn subject_count(&self) -> usize {
        self.assignments.len()
    }

    /// The domain's role hierarchy.
    pub fn hierarchy(&self) -> &RoleHierarchy {
        &self.hierarchy
    }

    /// Roles assigned directly to a subject.
    pub fn assigned_roles(&self, subject: &str) -> &[String] {
        self.assignments
            .get(subject)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Memoized closure of a role.
    ///
    /// Roles with no edges and no assignment are not memoized; their
    /// closure is the role alone.
    pub fn closure(&self, role: &str) -> Arc<RoleSet> {
        self.closures
            .get(role)
            .cloned()
            .unwrap_or_else(|| Arc::new(RoleSet::from([role.to_string()])))
    }

    /// Union of the closures of every role assigned to `subject`.
    pub fn expanded_roles(&self, subject: &str) -> RoleSet {
        self.assigned_roles(subject)
            .iter()
            .flat_map(|role| self.closure(role).iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Rules granted to a role.
    pub fn rules_for_role<'a>(&'a self, role: &str) -> impl Iterator<Item = &'a PolicyRule> + 'a {
        self.grants
            .get(role)
            .into_iter()
            .flatten()
            .map(move |&index| &self.rules[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(role: &str, resource: &str, action: &str) -> PolicyRule {
        PolicyRule::new("acme", role, resource, action).unwrap()
    }

    fn assign(subject: &str, role: &str) -> RoleAssignment {
        RoleAssignment::new("acme", subject, role).unwrap()
    }

    fn edge(child: &str, parent: &str) -> RoleHierarchyEdge {
        RoleHierarchyEdge::new("acme", child, parent).unwrap()
    }

    #[test]
    fn test_build_indexes_rules_and_roles() {
        let snapshot = DomainSnapshot::build(
            "acme",
            1,
            vec![rule("viewer", "doc", "read"), rule("editor", "doc", "write")],
            vec![assign("alice", "editor")],
            vec![edge("editor", "viewer")],
        )
        .unwrap();

        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.rules().len(), 2);
        assert_eq!(snapshot.assigned_roles("alice"), ["editor".to_string()]);
        assert_eq!(
            snapshot.expanded_roles("alice"),
            RoleSet::from(["editor".to_string(), "viewer".to_string()])
        );
        assert_eq!(snapshot.rules_for_role("viewer").count(), 1);
        assert_eq!(snapshot.rules_for_role("nobody").count(), 0);
    }

    #[test]
    fn test_duplicate_rules_collapse() {
        let snapshot = DomainSnapshot::build(
            "acme",
            1,
            vec![rule("viewer", "doc", "read"), rule("viewer", "doc", "read")],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(snapshot.rules().len(), 1);
        assert_eq!(snapshot.rules_for_role("viewer").count(), 1);
    }

    #[test]
    fn test_cycle_fails_build() {
        let result = DomainSnapshot::build(
            "acme",
            1,
            vec![],
            vec![],
            vec![edge("a", "b"), edge("b", "a")],
        );
        assert!(matches!(result, Err(AuthzError::CyclicHierarchy { .. })));
    }

    #[test]
    fn test_foreign_tuple_fails_build() {
        let result = DomainSnapshot::build(
            "acme",
            1,
            vec![PolicyRule::new("globex", "viewer", "doc", "read").unwrap()],
            vec![],
            vec![],
        );
        assert!(matches!(result, Err(AuthzError::Configuration { .. })));
    }

    #[test]
    fn test_unmemoized_closure_is_the_role() {
        let snapshot = DomainSnapshot::empty("acme");
        assert_eq!(*snapshot.closure("guest"), RoleSet::from(["guest".to_string()]));
        assert!(snapshot.expanded_roles("alice").is_empty());
        assert!(!snapshot.has_rules());
    }
}
