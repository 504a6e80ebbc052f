//! Per-domain snapshot cache
//!
//! Readers take the lock only long enough to clone `Arc`s, then evaluate
//! without holding anything. Writers replace one domain's `Arc` at a time,
//! so a reader sees either the old or the new snapshot of a domain, never
//! a partial one.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use platform_rbac::GLOBAL_DOMAIN;

use crate::snapshot::DomainSnapshot;

/// The snapshots one enforcement call reads from.
#[derive(Debug, Clone)]
pub struct PolicyView {
    /// Snapshot of the requested domain
    pub domain: Arc<DomainSnapshot>,
    /// Snapshot of the global domain, if loaded
    pub global: Option<Arc<DomainSnapshot>>,
}

impl PolicyView {
    /// The snapshot whose rules apply to the requested domain.
    ///
    /// A domain with zero rules falls back to the global rule set; any
    /// domain rule shadows the whole global set.
    pub fn rule_source(&self) -> (&DomainSnapshot, bool) {
        match &self.global {
            Some(global) if !self.domain.has_rules() => (global.as_ref(), true),
            _ => (self.domain.as_ref(), false),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of cached domains
    pub domains: usize,
    /// Rules across all cached domains
    pub rules: usize,
    /// Subjects with at least one role, across all domains
    pub subjects: usize,
    /// Snapshots published since startup
    pub publishes: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    snapshots: HashMap<String, Arc<DomainSnapshot>>,
    publishes: u64,
}

/// In-memory cache of compiled domain snapshots.
#[derive(Debug, Default)]
pub struct PolicyCache {
    inner: RwLock<CacheInner>,
}

impl PolicyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current snapshot of a domain.
    pub fn get(&self, domain: &str) -> Option<Arc<DomainSnapshot>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.snapshots.get(domain).cloned()
    }

    /// Get the snapshots needed to evaluate a request in `domain`.
    ///
    /// Both are read under one lock acquisition. A domain that was never
    /// loaded is served as empty.
    pub fn view(&self, domain: &str) -> PolicyView {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let global = inner.snapshots.get(GLOBAL_DOMAIN).cloned();
        let domain = inner
            .snapshots
            .get(domain)
            .cloned()
            .unwrap_or_else(|| Arc::new(DomainSnapshot::empty(domain)));
        PolicyView { domain, global }
    }

    /// Version of a domain's current snapshot, `0` if none.
    pub fn version(&self, domain: &str) -> u64 {
        self.get(domain).map_or(0, |s| s.version())
    }

    /// Replace a domain's snapshot.
    pub fn publish(&self, snapshot: DomainSnapshot) -> Arc<DomainSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner
            .snapshots
            .insert(snapshot.domain().to_string(), Arc::clone(&snapshot));
        inner.publishes += 1;
        snapshot
    }

    /// Drop a domain's snapshot.
    pub fn evict(&self, domain: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.snapshots.remove(domain).is_some()
    }

    /// Cached domains, sorted.
    pub fn domains(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut domains: Vec<String> = inner.snapshots.keys().cloned().collect();
        domains.sort();
        domains
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            domains: inner.snapshots.len(),
            rules: inner.snapshots.values().map(|s| s.rules().len()).sum(),
            subjects: inner.snapshots.values().map(|s| s.subject_count()).sum(),
            publishes: inner.publishes,
        }
    }
}
