//! Administrative mutations
//!
//! The only way policy changes. Every mutation writes the store first,
//! then rebuilds the affected domain in this instance's cache, then
//! announces the change so other instances rebuild theirs.

use std::sync::Arc;

use platform_events::PolicyEvent;
use platform_rbac::{PolicyRule, RoleAssignment, RoleHierarchyEdge};

use crate::error::{AuthzError, AuthzResult};
use crate::hierarchy::RoleHierarchy;
use crate::refresh::CacheRefresher;

/// Mutation entry points for rules, role assignments, and hierarchy edges.
///
/// Mutations return `true` if the store changed. A no-op mutation is not
/// refreshed or announced.
#[derive(Debug, Clone)]
pub struct PolicyAdmin {
    refresher: Arc<CacheRefresher>,
}

impl PolicyAdmin {
    /// Create an admin surface writing through `refresher`'s store.
    pub fn new(refresher: Arc<CacheRefresher>) -> Self {
        Self { refresher }
    }

    /// Grant a role access to a resource and action.
    pub async fn add_rule(&self, rule: PolicyRule) -> AuthzResult<bool> {
        rule.validate()?;
        let changed = self.refresher.store().add_rule(rule.clone()).await?;
        self.apply(changed, PolicyEvent::RuleAdded { rule }).await
    }

    /// Revoke a rule.
    pub async fn remove_rule(&self, rule: &PolicyRule) -> AuthzResult<bool> {
        let changed = self.refresher.store().remove_rule(rule).await?;
        self.apply(changed, PolicyEvent::RuleRemoved { rule: rule.clone() })
            .await
    }

    /// Give a subject a role in a domain.
    pub async fn assign_role(&self, assignment: RoleAssignment) -> AuthzResult<bool> {
        assignment.validate()?;
        let changed = self
            .refresher
            .store()
            .add_role_assignment(assignment.clone())
            .await?;
        self.apply(changed, PolicyEvent::RoleAssigned { assignment })
            .await
    }

    /// Take a role away from a subject.
    pub async fn unassign_role(&self, assignment: &RoleAssignment) -> AuthzResult<bool> {
        let changed = self
            .refresher
            .store()
            .remove_role_assignment(assignment)
            .await?;
        self.apply(
            changed,
            PolicyEvent::RoleUnassigned {
                assignment: assignment.clone(),
            },
        )
        .await
    }

    /// Make `edge.child()` inherit from `edge.parent()`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::CyclicHierarchy`] without writing anything if
    /// the edge would close a cycle in the stored hierarchy.
    pub async fn add_hierarchy_edge(&self, edge: RoleHierarchyEdge) -> AuthzResult<bool> {
        edge.validate()?;
        let domain = edge.domain();
        let mut edges = self.refresher.store().list_hierarchy(domain).await?;

        if RoleHierarchy::from_edges(domain, &edges).would_cycle(edge.child(), edge.parent()) {
            edges.push(edge.clone());
            let proposed = RoleHierarchy::from_edges(domain, &edges);
            let error = match proposed.resolve(edge.child()) {
                Err(e) => e,
                Ok(_) => AuthzError::CyclicHierarchy {
                    domain: domain.to_string(),
                    path: format!("{} -> {}", edge.child(), edge.parent()),
                },
            };
            tracing::warn!(domain, edge = %edge, error = %error, "Rejected hierarchy edge");
            return Err(error);
        }

        let changed = self
            .refresher
            .store()
            .add_hierarchy_edge(edge.clone())
            .await?;
        self.apply(changed, PolicyEvent::HierarchyEdgeAdded { edge })
            .await
    }

    /// Remove an inheritance edge.
    pub async fn remove_hierarchy_edge(&self, edge: &RoleHierarchyEdge) -> AuthzResult<bool> {
        let changed = self.refresher.store().remove_hierarchy_edge(edge).await?;
        self.apply(
            changed,
            PolicyEvent::HierarchyEdgeRemoved { edge: edge.clone() },
        )
        .await
    }

    /// Rules stored for a domain.
    pub async fn list_rules(&self, domain: &str) -> AuthzResult<Vec<PolicyRule>> {
        self.refresher.store().list_rules(Some(domain)).await
    }

    /// Role assignments stored for a domain.
    pub async fn list_assignments(&self, domain: &str) -> AuthzResult<Vec<RoleAssignment>> {
        self.refresher.store().list_assignments(domain).await
    }

    /// Roles stored for a subject in a domain, without inheritance.
    pub async fn roles_of(&self, subject: &str, domain: &str) -> AuthzResult<Vec<String>> {
        self.refresher
            .store()
            .list_role_assignments(domain, subject)
            .await
    }

    async fn apply(&self, changed: bool, change: PolicyEvent) -> AuthzResult<bool> {
        if !changed {
            tracing::debug!(event_type = change.event_type(), domain = change.domain(), "Policy unchanged");
            return Ok(false);
        }

        tracing::info!(
            event_type = change.event_type(),
            domain = change.domain(),
            origin = self.refresher.origin(),
            "Policy changed"
        );

        // The store already holds the change; announce it even if the
        // local rebuild fails so other instances can still pick it up
        let refreshed = self.refresher.refresh_domain(change.domain()).await;

        if let Some(bus) = self.refresher.event_bus() {
            let event = change.to_event().with_origin(self.refresher.origin());
            if let Err(e) = bus.publish(event).await {
                tracing::warn!(
                    event_type = change.event_type(),
                    domain = change.domain(),
                    error = %e,
                    "Failed to announce policy change"
                );
            }
        }

        refreshed.map(|_| true)
    }
}
