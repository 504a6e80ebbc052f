//! Cache refresh
//!
//! Rebuilds domain snapshots from the policy store. A refresh is triggered
//! by an administrative mutation, by a change notification from another
//! engine instance, or by periodic polling. A failed refresh never touches
//! the cache: the domain keeps serving its previous snapshot.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use platform_events::{
    mutation_topics, Event, EventBus, EventBusError, EventBusResult, EventHandler, PolicyEvent,
};
use platform_rbac::GLOBAL_DOMAIN;

use crate::cache::PolicyCache;
use crate::config::AuthzConfig;
use crate::error::{AuthzError, AuthzResult};
use crate::retry::{with_retry_if, RetryConfig};
use crate::snapshot::DomainSnapshot;
use crate::store::PolicyStore;

/// Outcome of a full refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshSummary {
    /// Domains whose snapshot was rebuilt
    pub refreshed: Vec<String>,
    /// Domains still serving their previous snapshot
    pub failed: Vec<String>,
    /// Domains dropped because the store no longer has tuples for them
    pub evicted: Vec<String>,
}

impl RefreshSummary {
    /// Check whether every domain refreshed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loads policy from the store into the cache.
pub struct CacheRefresher {
    store: Arc<dyn PolicyStore>,
    cache: Arc<PolicyCache>,
    retry: RetryConfig,
    failure_alert_threshold: u32,
    origin: String,
    bus: Option<Arc<dyn EventBus>>,
    /// One async lock per domain; refreshes of different domains run
    /// concurrently, refreshes of one domain are serialized
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Consecutive failures per domain
    failures: Mutex<HashMap<String, u32>>,
}

impl std::fmt::Debug for CacheRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRefresher")
            .field("origin", &self.origin)
            .field("retry", &self.retry)
            .field("failure_alert_threshold", &self.failure_alert_threshold)
            .field("events", &self.bus.is_some())
            .finish()
    }
}

impl CacheRefresher {
    /// Create a refresher.
    ///
    /// `origin` identifies this engine instance on the event bus.
    pub fn new(
        store: Arc<dyn PolicyStore>,
        cache: Arc<PolicyCache>,
        config: &AuthzConfig,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cache,
            retry: config.store_retry.clone(),
            failure_alert_threshold: config.failure_alert_threshold,
            origin: origin.into(),
            bus: None,
            locks: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Publish refresh outcomes to an event bus.
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Identifier of this engine instance.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The event bus, if one is attached.
    pub fn event_bus(&self) -> Option<&Arc<dyn EventBus>> {
        self.bus.as_ref()
    }

    /// The policy store refreshes read from.
    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    /// Consecutive failed refreshes of a domain.
    pub fn failure_count(&self, domain: &str) -> u32 {
        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.get(domain).copied().unwrap_or(0)
    }

    /// Rebuild one domain's snapshot from the store.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::StoreUnavailable`] if the store stayed unreachable
    ///   after retries
    /// - a configuration error if the domain's data cannot be compiled
    ///
    /// In both cases the previously published snapshot stays in place.
    pub async fn refresh_domain(&self, domain: &str) -> AuthzResult<Arc<DomainSnapshot>> {
        let lock = self.domain_lock(domain);
        let _guard = lock.lock().await;

        match self.build_snapshot(domain).await {
            Ok(snapshot) => {
                let rules = snapshot.rules().len();
                let subjects = snapshot.subject_count();
                let edges = snapshot.hierarchy().edge_count();
                let snapshot = self.cache.publish(snapshot);
                self.clear_failures(domain);

                tracing::info!(
                    domain,
                    version = snapshot.version(),
                    rules,
                    subjects,
                    edges,
                    "Policy snapshot published"
                );
                self.emit(PolicyEvent::DomainRefreshed {
                    domain: domain.to_string(),
                    rules,
                    version: snapshot.version(),
                })
                .await;
                Ok(snapshot)
            }
            Err(e) => {
                let failures = self.record_failure(domain);
                let serving = self.cache.version(domain);

                if e.is_configuration() || failures >= self.failure_alert_threshold {
                    tracing::error!(
                        domain,
                        failures,
                        serving_version = serving,
                        error_code = e.error_code(),
                        error = %e,
                        "Policy refresh failed, serving previous snapshot"
                    );
                } else {
                    tracing::warn!(
                        domain,
                        failures,
                        serving_version = serving,
                        error = %e,
                        "Policy refresh failed, serving previous snapshot"
                    );
                }
                self.emit(PolicyEvent::RefreshFailed {
                    domain: domain.to_string(),
                    reason: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    /// Refresh every domain the store knows, plus the global domain.
    ///
    /// Cached domains the store no longer holds any tuple for are evicted,
    /// checked again under the domain lock before removal. A failure in
    /// one domain does not stop the others.
    ///
    /// # Errors
    ///
    /// Fails only if the list of domains cannot be read.
    pub async fn refresh_all(&self) -> AuthzResult<RefreshSummary> {
        let listed = with_retry_if(
            &self.retry,
            "list_domains",
            || self.store.list_domains(),
            AuthzError::is_retryable,
        )
        .await?;

        let mut domains: BTreeSet<String> = listed.into_iter().collect();
        domains.insert(GLOBAL_DOMAIN.to_string());

        let mut summary = RefreshSummary::default();
        for domain in &domains {
            match self.refresh_domain(domain).await {
                Ok(_) => summary.refreshed.push(domain.clone()),
                Err(_) => summary.failed.push(domain.clone()),
            }
        }

        for cached in self.cache.domains() {
            if domains.contains(&cached) {
                continue;
            }
            let lock = self.domain_lock(&cached);
            let _guard = lock.lock().await;
            // The listing may predate a write that created this domain
            match self.has_stored_policy(&cached).await {
                Ok(false) => {}
                Ok(true) => continue,
                Err(e) => {
                    tracing::warn!(domain = %cached, error = %e, "Could not confirm domain is gone, keeping it");
                    continue;
                }
            }
            if self.cache.evict(&cached) {
                self.clear_failures(&cached);
                summary.evicted.push(cached);
            }
        }

        tracing::debug!(
            refreshed = summary.refreshed.len(),
            failed = summary.failed.len(),
            evicted = summary.evicted.len(),
            "Full policy refresh finished"
        );
        Ok(summary)
    }

    /// Refresh everything on a fixed interval until the task is aborted.
    ///
    /// The first refresh happens one interval after the call.
    pub fn spawn_polling(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let refresher = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = refresher.refresh_all().await {
                    tracing::warn!(error = %e, "Periodic policy refresh failed");
                }
            }
        })
    }

    async fn build_snapshot(&self, domain: &str) -> AuthzResult<DomainSnapshot> {
        let rules = with_retry_if(
            &self.retry,
            "list_rules",
            || self.store.list_rules(Some(domain)),
            AuthzError::is_retryable,
        )
        .await?;
        let assignments = with_retry_if(
            &self.retry,
            "list_assignments",
            || self.store.list_assignments(domain),
            AuthzError::is_retryable,
        )
        .await?;
        let edges = with_retry_if(
            &self.retry,
            "list_hierarchy",
            || self.store.list_hierarchy(domain),
            AuthzError::is_retryable,
        )
        .await?;

        let version = self.cache.version(domain) + 1;
        DomainSnapshot::build(domain, version, rules, assignments, edges)
    }

    async fn has_stored_policy(&self, domain: &str) -> AuthzResult<bool> {
        Ok(!self.store.list_rules(Some(domain)).await?.is_empty()
            || !self.store.list_assignments(domain).await?.is_empty()
            || !self.store.list_hierarchy(domain).await?.is_empty())
    }

    fn domain_lock(&self, domain: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(domain.to_string()).or_default())
    }

    fn record_failure(&self, domain: &str) -> u32 {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let count = failures.entry(domain.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn clear_failures(&self, domain: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.remove(domain);
    }

    async fn emit(&self, event: PolicyEvent) {
        if let Some(bus) = &self.bus {
            if let Err(e) = bus.publish(event.to_event().with_origin(&self.origin)).await {
                tracing::warn!(event_type = event.event_type(), error = %e, "Failed to publish policy event");
            }
        }
    }
}

/// Refreshes a domain when another engine instance changes its policy.
pub struct PolicyChangeHandler {
    refresher: Arc<CacheRefresher>,
}

impl PolicyChangeHandler {
    /// Create a handler driving `refresher`.
    pub fn new(refresher: Arc<CacheRefresher>) -> Self {
        Self { refresher }
    }
}

#[async_trait]
impl EventHandler for PolicyChangeHandler {
    async fn handle(&self, event: Event) -> EventBusResult<()> {
        // This instance already refreshed before publishing
        if event.origin.as_deref() == Some(self.refresher.origin()) {
            return Ok(());
        }

        let change = match PolicyEvent::from_event(&event) {
            Some(change) if change.is_mutation() => change,
            _ => return Ok(()),
        };

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            domain = change.domain(),
            origin = ?event.origin,
            "Refreshing domain after remote policy change"
        );

        self.refresher
            .refresh_domain(change.domain())
            .await
            .map(|_| ())
            .map_err(|e| EventBusError::HandlerError(e.to_string()))
    }

    fn topics(&self) -> Vec<String> {
        mutation_topics()
    }
}
