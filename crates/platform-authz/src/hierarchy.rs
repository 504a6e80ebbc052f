//! Role hierarchy resolution
//!
//! Expands a role into every role it inherits within one domain. Edges
//! point from child to parent; the closure of a role always contains the
//! role itself.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use platform_rbac::RoleHierarchyEdge;

use crate::error::{AuthzError, AuthzResult};

/// Set of role names, ordered for stable logs and explanations.
pub type RoleSet = BTreeSet<String>;

/// The inheritance graph of a single domain.
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    domain: String,
    /// child -> parents, in edge order
    parents: HashMap<String, Vec<String>>,
}

impl RoleHierarchy {
    /// Build the graph of `domain` from its edges.
    ///
    /// Edges belonging to other domains are ignored.
    pub fn from_edges<'a>(
        domain: &str,
        edges: impl IntoIterator<Item = &'a RoleHierarchyEdge>,
    ) -> Self {
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for edge in edges.into_iter().filter(|e| e.domain() == domain) {
            let entry = parents.entry(edge.child().to_string()).or_default();
            if !entry.iter().any(|p| p == edge.parent()) {
                entry.push(edge.parent().to_string());
            }
        }
        Self {
            domain: domain.to_string(),
            parents,
        }
    }

    /// The domain this graph belongs to.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Roles that appear as the child of at least one edge.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.parents.values().map(Vec::len).sum()
    }

    /// Direct parents of a role.
    pub fn parents_of(&self, role: &str) -> &[String] {
        self.parents.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve the transitive closure of `role`, including `role` itself.
    ///
    /// Breadth-first over child -> parent edges. Diamonds are visited once.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::CyclicHierarchy`] if any role reachable from
    /// `role` lies on a cycle.
    pub fn resolve(&self, role: &str) -> AuthzResult<RoleSet> {
        let mut visited: RoleSet = BTreeSet::new();
        let mut queue = VecDeque::new();
        visited.insert(role.to_string());
        queue.push_back(role);

        while let Some(current) = queue.pop_front() {
            for parent in self.parents_of(current) {
                if visited.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }

        // A revisit above is either a diamond or a cycle; tell them apart
        if let Some(path) = self.find_cycle(visited.iter().map(String::as_str)) {
            return Err(self.cycle_error(path));
        }

        Ok(visited)
    }

    /// Check the whole graph for cycles.
    pub fn validate(&self) -> AuthzResult<()> {
        match self.find_cycle(self.children()) {
            Some(path) => Err(self.cycle_error(path)),
            None => Ok(()),
        }
    }

    /// Check whether adding `child -> parent` would close a cycle.
    pub fn would_cycle(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return true;
        }
        // A cycle appears iff child is already reachable from parent
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([parent]);
        while let Some(current) = queue.pop_front() {
            if current == child {
                return true;
            }
            if seen.insert(current) {
                queue.extend(self.parents_of(current).iter().map(String::as_str));
            }
        }
        false
    }

    /// Kahn's algorithm over the subgraph reachable from `roots`.
    ///
    /// Returns the roles of one cycle, closed (first == last), if the
    /// subgraph cannot be topologically ordered.
    fn find_cycle<'a>(&'a self, roots: impl Iterator<Item = &'a str>) -> Option<Vec<String>> {
        // Collect the reachable node set
        let mut nodes: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = roots.collect();
        while let Some(current) = stack.pop() {
            if nodes.insert(current) {
                stack.extend(self.parents_of(current).iter().map(String::as_str));
            }
        }

        let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (*n, 0)).collect();
        for node in &nodes {
            for parent in self.parents_of(node) {
                if let Some(d) = in_degree.get_mut(parent.as_str()) {
                    *d += 1;
                }
            }
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        while let Some(node) = ready.pop() {
            in_degree.remove(node);
            for parent in self.parents_of(node) {
                if let Some(d) = in_degree.get_mut(parent.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(parent.as_str());
                    }
                }
            }
        }

        // Every leftover node keeps a leftover child, so walking child
        // edges must eventually repeat a node
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in in_degree.keys() {
            for parent in self.parents_of(node) {
                if in_degree.contains_key(parent.as_str()) {
                    children.entry(parent.as_str()).or_default().push(*node);
                }
            }
        }

        let start = in_degree.keys().min().copied()?;
        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = children.get(current)?.iter().min().copied()?;
            if let Some(pos) = path.iter().position(|p| *p == next) {
                // Path runs parent -> child; report it child -> parent
                let mut cycle: Vec<String> = path[pos..].iter().map(|r| r.to_string()).collect();
                cycle.push(next.to_string());
                cycle.reverse();
                return Some(cycle);
            }
            path.push(next);
            current = next;
        }
    }

    fn cycle_error(&self, path: Vec<String>) -> AuthzError {
        AuthzError::CyclicHierarchy {
            domain: self.domain.clone(),
            path: path.join(" -> "),
        }
    }
}
