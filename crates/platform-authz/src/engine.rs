//! Engine facade
//!
//! Wires the store, cache, refresher, enforcer, and admin surface of one
//! engine instance together. Build one per process and share it by `Arc`.

use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use platform_events::EventBus;

use crate::admin::PolicyAdmin;
use crate::cache::PolicyCache;
use crate::config::AuthzConfig;
use crate::enforcer::Enforcer;
use crate::error::AuthzResult;
use crate::refresh::{CacheRefresher, PolicyChangeHandler, RefreshSummary};
use crate::store::PolicyStore;

/// One authorization engine instance.
#[derive(Debug)]
pub struct AuthzEngine {
    config: AuthzConfig,
    cache: Arc<PolicyCache>,
    refresher: Arc<CacheRefresher>,
    enforcer: Enforcer,
    admin: PolicyAdmin,
    instance_id: String,
}

impl AuthzEngine {
    /// Create an engine over a store.
    ///
    /// The cache starts empty, so every request is denied until
    /// [`AuthzEngine::bootstrap`] has run.
    pub fn new(store: Arc<dyn PolicyStore>, config: AuthzConfig) -> AuthzResult<Self> {
        config.validate()?;
        let instance_id = Uuid::now_v7().to_string();
        let cache = Arc::new(PolicyCache::new());
        let refresher = Arc::new(CacheRefresher::new(
            store,
            Arc::clone(&cache),
            &config,
            instance_id.clone(),
        ));
        Ok(Self::assemble(config, cache, refresher, instance_id))
    }

    /// Create an engine that announces changes on `bus` and refreshes when
    /// other instances announce theirs.
    pub async fn with_event_bus(
        store: Arc<dyn PolicyStore>,
        config: AuthzConfig,
        bus: Arc<dyn EventBus>,
    ) -> AuthzResult<Self> {
        config.validate()?;
        let instance_id = Uuid::now_v7().to_string();
        let cache = Arc::new(PolicyCache::new());
        let refresher = Arc::new(
            CacheRefresher::new(store, Arc::clone(&cache), &config, instance_id.clone())
                .with_event_bus(Arc::clone(&bus)),
        );

        bus.register_handler(Arc::new(PolicyChangeHandler::new(Arc::clone(&refresher))))
            .await?;

        tracing::info!(instance_id = %instance_id, "Authorization engine subscribed to policy changes");
        Ok(Self::assemble(config, cache, refresher, instance_id))
    }

    fn assemble(
        config: AuthzConfig,
        cache: Arc<PolicyCache>,
        refresher: Arc<CacheRefresher>,
        instance_id: String,
    ) -> Self {
        Self {
            enforcer: Enforcer::new(Arc::clone(&cache)),
            admin: PolicyAdmin::new(Arc::clone(&refresher)),
            config,
            cache,
            refresher,
            instance_id,
        }
    }

    /// Load every domain from the store.
    pub async fn bootstrap(&self) -> AuthzResult<RefreshSummary> {
        let summary = self.refresher.refresh_all().await?;
        tracing::info!(
            instance_id = %self.instance_id,
            domains = summary.refreshed.len(),
            failed = summary.failed.len(),
            "Authorization engine bootstrapped"
        );
        Ok(summary)
    }

    /// Start periodic refresh if the configuration enables it.
    pub fn start_polling(&self) -> Option<JoinHandle<()>> {
        self.config
            .poll_interval()
            .map(|interval| self.refresher.spawn_polling(interval))
    }

    /// The access decision point.
    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }

    /// The mutation surface.
    pub fn admin(&self) -> &PolicyAdmin {
        &self.admin
    }

    /// The refresher.
    pub fn refresher(&self) -> &Arc<CacheRefresher> {
        &self.refresher
    }

    /// The snapshot cache.
    pub fn cache(&self) -> &Arc<PolicyCache> {
        &self.cache
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// Identifier of this instance on the event bus.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}
