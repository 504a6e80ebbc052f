//! Policy store contract
//!
//! The store is the single source of truth for rules, role assignments,
//! and hierarchy edges. Everything the engine keeps in memory is derived
//! from it and can be thrown away. Each mutation must be atomic and durable
//! before it returns.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::RwLock;

use platform_rbac::{PolicyRule, RoleAssignment, RoleHierarchyEdge};

use crate::error::AuthzResult;

/// Durable storage of authorization state.
///
/// Implementations back onto a database or an external policy service.
/// Read failures should surface as [`crate::AuthzError::StoreUnavailable`]
/// so refresh can retry them.
///
/// Mutations return `true` if the store changed. Inserting a tuple that
/// already exists, or removing one that does not, returns `false`.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// List rules, optionally restricted to one domain.
    async fn list_rules(&self, domain: Option<&str>) -> AuthzResult<Vec<PolicyRule>>;

    /// List the roles a subject holds directly in a domain.
    async fn list_role_assignments(&self, domain: &str, subject: &str) -> AuthzResult<Vec<String>>;

    /// List every role assignment in a domain.
    async fn list_assignments(&self, domain: &str) -> AuthzResult<Vec<RoleAssignment>>;

    /// List the hierarchy edges of a domain.
    async fn list_hierarchy(&self, domain: &str) -> AuthzResult<Vec<RoleHierarchyEdge>>;

    /// List every domain that has at least one tuple of any kind.
    async fn list_domains(&self) -> AuthzResult<Vec<String>>;

    /// Insert a rule.
    async fn add_rule(&self, rule: PolicyRule) -> AuthzResult<bool>;

    /// Delete a rule.
    async fn remove_rule(&self, rule: &PolicyRule) -> AuthzResult<bool>;

    /// Insert a role assignment.
    async fn add_role_assignment(&self, assignment: RoleAssignment) -> AuthzResult<bool>;

    /// Delete a role assignment.
    async fn remove_role_assignment(&self, assignment: &RoleAssignment) -> AuthzResult<bool>;

    /// Insert a hierarchy edge.
    async fn add_hierarchy_edge(&self, edge: RoleHierarchyEdge) -> AuthzResult<bool>;

    /// Delete a hierarchy edge.
    async fn remove_hierarchy_edge(&self, edge: &RoleHierarchyEdge) -> AuthzResult<bool>;
}

#[derive(Debug, Default)]
struct StoreState {
    rules: Vec<PolicyRule>,
    assignments: Vec<RoleAssignment>,
    edges: Vec<RoleHierarchyEdge>,
}

fn insert_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        return false;
    }
    items.push(item);
    true
}

fn remove_item<T: PartialEq>(items: &mut Vec<T>, item: &T) -> bool {
    let before = items.len();
    items.retain(|existing| existing != item);
    items.len() != before
}

/// In-memory policy store.
///
/// Tuples are kept in insertion order with duplicates suppressed. Suitable
/// for tests, single-process deployments, and seeding from configuration.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    state: RwLock<StoreState>,
}

impl MemoryPolicyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with tuples.
    ///
    /// Duplicates are dropped, as if each tuple had been added in turn.
    pub fn with_policies(
        rules: impl IntoIterator<Item = PolicyRule>,
        assignments: impl IntoIterator<Item = RoleAssignment>,
        edges: impl IntoIterator<Item = RoleHierarchyEdge>,
    ) -> Self {
        let mut state = StoreState::default();
        for rule in rules {
            insert_unique(&mut state.rules, rule);
        }
        for assignment in assignments {
            insert_unique(&mut state.assignments, assignment);
        }
        for edge in edges {
            insert_unique(&mut state.edges, edge);
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn list_rules(&self, domain: Option<&str>) -> AuthzResult<Vec<PolicyRule>> {
        let state = self.state.read().await;
        Ok(state
            .rules
            .iter()
            .filter(|rule| domain.map_or(true, |d| rule.domain() == d))
            .cloned()
            .collect())
    }

    async fn list_role_assignments(&self, domain: &str, subject: &str) -> AuthzResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.domain() == domain && a.subject() == subject)
            .map(|a| a.role().to_string())
            .collect())
    }

    async fn list_assignments(&self, domain: &str) -> AuthzResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.domain() == domain)
            .cloned()
            .collect())
    }

    async fn list_hierarchy(&self, domain: &str) -> AuthzResult<Vec<RoleHierarchyEdge>> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .filter(|e| e.domain() == domain)
            .cloned()
            .collect())
    }

    async fn list_domains(&self) -> AuthzResult<Vec<String>> {
        let state = self.state.read().await;
        let domains: BTreeSet<&str> = state
            .rules
            .iter()
            .map(PolicyRule::domain)
            .chain(state.assignments.iter().map(RoleAssignment::domain))
            .chain(state.edges.iter().map(RoleHierarchyEdge::domain))
            .collect();
        Ok(domains.into_iter().map(str::to_string).collect())
    }

    async fn add_rule(&self, rule: PolicyRule) -> AuthzResult<bool> {
        rule.validate()?;
        Ok(insert_unique(&mut self.state.write().await.rules, rule))
    }

    async fn remove_rule(&self, rule: &PolicyRule) -> AuthzResult<bool> {
        Ok(remove_item(&mut self.state.write().await.rules, rule))
    }

    async fn add_role_assignment(&self, assignment: RoleAssignment) -> AuthzResult<bool> {
        assignment.validate()?;
        Ok(insert_unique(
            &mut self.state.write().await.assignments,
            assignment,
        ))
    }

    async fn remove_role_assignment(&self, assignment: &RoleAssignment) -> AuthzResult<bool> {
        Ok(remove_item(
            &mut self.state.write().await.assignments,
            assignment,
        ))
    }

    async fn add_hierarchy_edge(&self, edge: RoleHierarchyEdge) -> AuthzResult<bool> {
        edge.validate()?;
        Ok(insert_unique(&mut self.state.write().await.edges, edge))
    }

    async fn remove_hierarchy_edge(&self, edge: &RoleHierarchyEdge) -> AuthzResult<bool> {
        Ok(remove_item(&mut self.state.write().await.edges, edge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(domain: &str, role: &str, resource: &str, action: &str) -> PolicyRule {
        PolicyRule::new(domain, role, resource, action).unwrap()
    }

    #[tokio::test]
    async fn test_add_rule_is_idempotent() {
        let store = MemoryPolicyStore::new();
        assert!(store.add_rule(rule("acme", "viewer", "doc", "read")).await.unwrap());
        assert!(!store.add_rule(rule("acme", "viewer", "doc", "read")).await.unwrap());
        assert_eq!(store.list_rules(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_rules_filters_by_domain() {
        let store = MemoryPolicyStore::with_policies(
            vec![
                rule("acme", "viewer", "doc", "read"),
                rule("globex", "viewer", "doc", "read"),
                rule("", "member", "profile", "read"),
            ],
            vec![],
            vec![],
        );

        assert_eq!(store.list_rules(Some("acme")).await.unwrap().len(), 1);
        assert_eq!(store.list_rules(Some("")).await.unwrap().len(), 1);
        assert_eq!(store.list_rules(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_absent_rule_is_noop() {
        let store = MemoryPolicyStore::new();
        assert!(!store
            .remove_rule(&rule("acme", "viewer", "doc", "read"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_role_assignments_are_domain_scoped() {
        let store = MemoryPolicyStore::new();
        store
            .add_role_assignment(RoleAssignment::new("acme", "alice", "editor").unwrap())
            .await
            .unwrap();
        store
            .add_role_assignment(RoleAssignment::new("globex", "alice", "viewer").unwrap())
            .await
            .unwrap();

        assert_eq!(
            store.list_role_assignments("acme", "alice").await.unwrap(),
            vec!["editor".to_string()]
        );
        assert_eq!(
            store.list_role_assignments("globex", "alice").await.unwrap(),
            vec!["viewer".to_string()]
        );
        assert!(store
            .list_role_assignments("initech", "alice")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_domains_covers_all_tuple_kinds() {
        let store = MemoryPolicyStore::with_policies(
            vec![rule("acme", "viewer", "doc", "read")],
            vec![RoleAssignment::new("globex", "bob", "viewer").unwrap()],
            vec![RoleHierarchyEdge::new("initech", "editor", "viewer").unwrap()],
        );
        assert_eq!(
            store.list_domains().await.unwrap(),
            vec!["acme".to_string(), "globex".to_string(), "initech".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rejects_invalid_deserialized_tuple() {
        let store = MemoryPolicyStore::new();
        let bad: PolicyRule = serde_json::from_str(
            r#"{"domain":"acme","role":"","resource":"doc","action":"read"}"#,
        )
        .unwrap();
        assert!(store.add_rule(bad).await.is_err());
    }
}
