//! In-memory TTL cache for read endpoints.
//!
//! Entries are keyed by endpoint name plus query parameters and carry their own
//! expiry. An expired entry is removed when read; the background sweeper
//! removes the ones nobody reads again. There is no size bound and nothing is
//! persisted.

use serde::Serialize;
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::RwLock, task::JoinHandle, time::Instant};
use tracing::{debug, trace, warn};

/// Builds the cache key for `endpoint` called with `params`.
///
/// Object keys are sorted so equal parameters always give the same key.
#[must_use]
pub fn cache_key<P: Serialize>(endpoint: &str, params: &P) -> String {
    let params = serde_json::to_value(params).unwrap_or_else(|e| {
        warn!(endpoint, "Cache parameters not serializable: {e}");
        Value::Null
    });
    let mut key = Map::new();
    key.insert("endpoint".to_string(), Value::String(endpoint.to_string()));
    key.insert("params".to_string(), sorted(params));
    Value::Object(key).to_string()
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    data: V,
    endpoint: String,
    inserted_at: Instant,
    expires_at: Instant,
}

/// A keyed cache whose entries expire after a time-to-live.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    default_ttl: Duration,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache using `default_ttl` for [`TtlCache::set`].
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Returns a live entry. An expired entry is deleted and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    trace!(
                        key,
                        age_ms = now.duration_since(entry.inserted_at).as_millis(),
                        "Cache hit"
                    );
                    return Some(entry.data.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write().await;
        // Re-check under the write lock; a writer may have refreshed it.
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.data.clone());
            }
            entries.remove(key);
            trace!(key, "Cache entry expired");
        }
        None
    }

    /// Stores `data` with the default TTL.
    pub async fn set(&self, endpoint: &str, key: String, data: V) {
        self.set_with_ttl(endpoint, key, data, self.default_ttl).await;
    }

    /// Stores `data` expiring after `ttl`.
    pub async fn set_with_ttl(&self, endpoint: &str, key: String, data: V, ttl: Duration) {
        let now = Instant::now();
        let entry = Entry {
            data,
            endpoint: endpoint.to_string(),
            inserted_at: now,
            expires_at: now + ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Drops one entry.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drops every entry cached for `endpoint`. Returns how many were dropped.
    pub async fn invalidate_endpoint(&self, endpoint: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.endpoint != endpoint);
        let dropped = before - entries.len();
        if dropped > 0 {
            debug!(endpoint, dropped, "Invalidated cached endpoint");
        }
        dropped
    }

    /// Removes every expired entry. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        debug!(removed, remaining = entries.len(), "Cache sweep");
        removed
    }

    /// Number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops everything.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Spawns a task sweeping the cache every `interval` until aborted.
    #[must_use]
    pub fn spawn_sweeper(cache: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;
    use tokio::time::advance;

    #[test]
    fn test_key_ignores_param_order() {
        let a = cache_key("listings", &json!({"category": "books", "page": 1}));
        let b = cache_key("listings", &json!({"page": 1, "category": "books"}));
        assert_eq!(a, b);
        assert_ne!(a, cache_key("offers", &json!({"category": "books", "page": 1})));
        assert_eq!(
            cache_key("listings", &json!({"b": {"y": 1, "x": 2}, "a": 0})),
            r#"{"endpoint":"listings","params":{"a":0,"b":{"x":2,"y":1}}}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache
            .set_with_ttl("listings", "k".to_string(), 1, Duration::from_millis(1000))
            .await;
        cache.set("listings", "other".to_string(), 2).await;
        assert_eq!(cache.get("k").await, Some(1));

        advance(Duration::from_millis(1001)).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("other").await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache
            .set_with_ttl("a", "short".to_string(), "x", Duration::from_secs(1))
            .await;
        cache.set("a", "long".to_string(), "y").await;

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_periodically() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(1)));
        cache.set("a", "k".to_string(), 1).await;
        let handle = TtlCache::spawn_sweeper(Arc::clone(&cache), Duration::from_secs(600));
        tokio::task::yield_now().await;

        advance(Duration::from_secs(601)).await;
        tokio::task::yield_now().await;
        assert!(cache.is_empty().await);
        handle.abort();
    }

    #[tokio::test]
    async fn test_invalidate_endpoint() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.set("listings", "l1".to_string(), 1).await;
        cache.set("listings", "l2".to_string(), 2).await;
        cache.set("offers", "o1".to_string(), 3).await;

        assert_eq!(cache.invalidate_endpoint("listings").await, 2);
        assert_eq!(cache.len().await, 1);
        assert!(cache.invalidate("o1").await);
        assert!(!cache.invalidate("o1").await);
        cache.set("offers", "o2".to_string(), 4).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
