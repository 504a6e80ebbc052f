//! Event bus implementation
//!
//! This module provides the event bus abstraction and the in-process
//! implementation used to fan policy changes out to cache refreshers.

use crate::types::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Failed to publish event
    #[error("Failed to publish event: {0}")]
    PublishError(String),

    /// Failed to subscribe
    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    /// Handler failed to process an event
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Subscription ID
    pub id: String,
    /// Topic pattern
    pub topic: String,
    /// Event receiver
    pub receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event.
    ///
    /// A receiver that fell behind skips the dropped events and keeps
    /// receiving; only a closed channel ends the subscription.
    pub async fn recv(&mut self) -> EventBusResult<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        subscription = %self.id,
                        skipped,
                        "Subscriber lagged, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed)
                }
            }
        }
    }
}

/// Event handler trait for processing events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: Event) -> EventBusResult<()>;

    /// Get the topics this handler is interested in.
    fn topics(&self) -> Vec<String>;
}

/// Event bus trait for publish/subscribe operations.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> EventBusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Topic patterns support wildcards:
    /// - `*` matches any single segment
    /// - `#` matches zero or more segments
    ///
    /// Examples:
    /// - `authz.rule.*` matches `authz.rule.added`, `authz.rule.removed`
    /// - `authz.#` matches every authorization event
    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription>;

    /// Register an event handler.
    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()>;

    /// Unsubscribe from a topic.
    async fn unsubscribe(&self, subscription_id: &str) -> EventBusResult<()>;

    /// Get event bus stats.
    async fn stats(&self) -> EventBusStats;
}

/// Event bus statistics.
#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Total events delivered to subscribers or handlers
    pub events_delivered: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
    /// Registered handlers
    pub registered_handlers: usize,
}

/// In-memory event bus implementation.
///
/// This is suitable for single-process deployments and testing. Each
/// engine instance attached to the same bus sees every other instance's
/// policy changes.
pub struct MemoryEventBus {
    /// Topic subscribers
    subscribers: Arc<RwLock<HashMap<String, broadcast::Sender<Event>>>>,
    /// Subscription ID -> topic pattern
    subscriptions: Arc<RwLock<HashMap<String, String>>>,
    /// Registered handlers
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    /// Statistics
    stats: Arc<RwLock<EventBusStats>>,
    /// Default channel capacity
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventBus")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl MemoryEventBus {
    /// Create a new in-memory event bus.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(Vec::new())),
            stats: Arc::new(RwLock::new(EventBusStats::default())),
            channel_capacity: capacity,
        }
    }

    /// Check if a topic matches a pattern.
    pub fn topic_matches(pattern: &str, topic: &str) -> bool {
        let pattern_parts: Vec<&str> = pattern.split('.').collect();
        let topic_parts: Vec<&str> = topic.split('.').collect();
        Self::segments_match(&pattern_parts, &topic_parts)
    }

    fn segments_match(pattern: &[&str], topic: &[&str]) -> bool {
        match (pattern.first(), topic.first()) {
            (None, None) => true,
            (Some(&"#"), _) => {
                // Zero segments, or consume one and stay on `#`
                Self::segments_match(&pattern[1..], topic)
                    || (!topic.is_empty() && Self::segments_match(pattern, &topic[1..]))
            }
            (Some(&"*"), Some(_)) => Self::segments_match(&pattern[1..], &topic[1..]),
            (Some(segment), Some(part)) if segment == part => {
                Self::segments_match(&pattern[1..], &topic[1..])
            }
            _ => false,
        }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> EventBusResult<()> {
        let topic = event.topic();
        let mut delivered = 0u64;

        // Notify matching subscribers
        {
            let subscribers = self.subscribers.read().await;
            for (pattern, sender) in subscribers.iter() {
                if Self::topic_matches(pattern, &topic) && sender.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        // Notify handlers
        {
            let handlers = self.handlers.read().await;
            for handler in handlers.iter() {
                if handler
                    .topics()
                    .iter()
                    .any(|handler_topic| Self::topic_matches(handler_topic, &topic))
                {
                    let handler = handler.clone();
                    let event = event.clone();
                    delivered += 1;
                    tokio::task::spawn(async move {
                        let event_id = event.id;
                        let topic = event.topic();
                        if let Err(e) = handler.handle(event).await {
                            tracing::error!(%event_id, %topic, error = %e, "Handler error");
                        }
                    });
                }
            }
        }

        // Update stats
        {
            let mut stats = self.stats.write().await;
            stats.events_published += 1;
            stats.events_delivered += delivered;
        }

        tracing::debug!(topic = %topic, event_id = %event.id, delivered, "Event published");

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription> {
        let id = uuid::Uuid::now_v7().to_string();

        // Both maps change under the subscribers lock so that unsubscribe
        // never drops a channel a new subscription is joining
        let receiver = {
            let mut subscribers = self.subscribers.write().await;

            let receiver = if let Some(sender) = subscribers.get(topic) {
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(self.channel_capacity);
                subscribers.insert(topic.to_string(), sender);
                receiver
            };

            self.subscriptions
                .write()
                .await
                .insert(id.clone(), topic.to_string());
            receiver
        };

        // Update stats
        {
            let mut stats = self.stats.write().await;
            stats.active_subscriptions += 1;
        }

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        })
    }

    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()> {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);

        // Update stats
        {
            let mut stats = self.stats.write().await;
            stats.registered_handlers += 1;
        }

        Ok(())
    }

    async fn unsubscribe(&self, subscription_id: &str) -> EventBusResult<()> {
        {
            let mut subscribers = self.subscribers.write().await;
            let mut subscriptions = self.subscriptions.write().await;
            let pattern = subscriptions.remove(subscription_id).ok_or_else(|| {
                EventBusError::SubscribeError(format!("unknown subscription {}", subscription_id))
            })?;

            // Drop the channel once nobody listens on the pattern
            if !subscriptions.values().any(|p| *p == pattern) {
                subscribers.remove(&pattern);
            }
        }

        // Update stats
        {
            let mut stats = self.stats.write().await;
            stats.active_subscriptions = stats.active_subscriptions.saturating_sub(1);
        }

        Ok(())
    }

    async fn stats(&self) -> EventBusStats {
        self.stats.read().await.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_event_bus_publish_subscribe() {
        let bus = MemoryEventBus::new();

        // Subscribe to topic
        let mut sub = bus.subscribe("authz.rule.*").await.unwrap();

        // Publish event
        let event = Event::new("rule.added", serde_json::json!({})).with_domain("acme");
        bus.publish(event.clone()).await.unwrap();

        // Receive event
        let received = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(received.id, event.id);
        assert_eq!(received.domain.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_unsubscribe_keeps_channel_for_remaining_subscribers() {
        let bus = MemoryEventBus::new();
        let first = bus.subscribe("authz.#").await.unwrap();
        let mut second = bus.subscribe("authz.#").await.unwrap();

        bus.unsubscribe(&first.id).await.unwrap();
        bus.publish(Event::new("rule.added", serde_json::json!({})))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), second.recv()).await;
        assert!(matches!(received, Ok(Ok(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_and_unsubscribe_on_one_pattern() {
        let bus = Arc::new(MemoryEventBus::new());

        for _ in 0..100 {
            let leaving = {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move {
                    let sub = bus.subscribe("authz.rule.*").await.unwrap();
                    bus.unsubscribe(&sub.id).await.unwrap();
                })
            };
            let joining = {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move { bus.subscribe("authz.rule.*").await.unwrap() })
            };
            leaving.await.unwrap();
            let mut sub = joining.await.unwrap();

            bus.publish(Event::new("rule.added", serde_json::json!({})))
                .await
                .unwrap();
            let received = tokio::time::timeout(Duration::from_millis(100), sub.recv()).await;
            assert!(matches!(received, Ok(Ok(_))));

            bus.unsubscribe(&sub.id).await.unwrap();
        }
    }

    #[test]
    fn test_topic_matching() {
        // Exact match
        assert!(MemoryEventBus::topic_matches("authz.rule.added", "authz.rule.added"));

        // Single wildcard
        assert!(MemoryEventBus::topic_matches("authz.rule.*", "authz.rule.added"));
        assert!(MemoryEventBus::topic_matches("authz.*.added", "authz.rule.added"));
        assert!(MemoryEventBus::topic_matches("*.rule.added", "authz.rule.added"));

        // Multi-segment wildcard
        assert!(MemoryEventBus::topic_matches("authz.#", "authz.rule.added"));
        assert!(MemoryEventBus::topic_matches("#", "authz.rule.added"));
        assert!(MemoryEventBus::topic_matches("authz.#.added", "authz.rule.added"));
        assert!(MemoryEventBus::topic_matches("authz.rule.#", "authz.rule"));

        // Non-matches
        assert!(!MemoryEventBus::topic_matches("authz.rule.removed", "authz.rule.added"));
        assert!(!MemoryEventBus::topic_matches("billing.rule.*", "authz.rule.added"));
        assert!(!MemoryEventBus::topic_matches("authz.*", "authz.rule.added"));
    }

    struct CountingHandler {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: Event) -> EventBusResult<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn topics(&self) -> Vec<String> {
            // Overlapping patterns must not deliver twice
            vec!["authz.rule.*".to_string(), "authz.#".to_string()]
        }
    }

    #[tokio::test]
    async fn test_handler_invoked_once_per_event() {
        let bus = MemoryEventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        bus.register_handler(Arc::new(CountingHandler { seen: seen.clone() }))
            .await
            .unwrap();

        bus.publish(Event::new("rule.added", serde_json::json!({})))
            .await
            .unwrap();
        bus.publish(Event::new("other", serde_json::json!({})))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = MemoryEventBus::new();

        let stats = bus.stats().await;
        assert_eq!(stats.events_published, 0);
        assert_eq!(stats.active_subscriptions, 0);

        let sub = bus.subscribe("authz.*").await.unwrap();
        let stats = bus.stats().await;
        assert_eq!(stats.active_subscriptions, 1);

        let event = Event::new("event", serde_json::json!({}));
        bus.publish(event).await.unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.events_delivered, 1);

        bus.unsubscribe(&sub.id).await.unwrap();
        assert_eq!(bus.stats().await.active_subscriptions, 0);
        assert!(bus.unsubscribe(&sub.id).await.is_err());
    }
}
