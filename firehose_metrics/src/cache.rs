//! Keyed cache whose entries carry their own expiry deadline.
//!
//! Expired entries stay in the map until the sweeper removes them, so every
//! read path filters on the deadline as well.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How long an entry lives once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Expires after the cache's default TTL.
    Default,
    /// Lives until deleted or flushed.
    Never,
}

/// Deadline in unix milliseconds for an entry written now, `None` when it
/// never expires. A zero TTL means entries never expire.
pub fn expiry_deadline(default_ttl: Duration, retention: Retention) -> Option<i64> {
    match retention {
        Retention::Never => None,
        Retention::Default if default_ttl.is_zero() => None,
        Retention::Default => {
            let ttl_ms = i64::try_from(default_ttl.as_millis()).unwrap_or(i64::MAX);
            Some(Utc::now().timestamp_millis().saturating_add(ttl_ms))
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at_ms: Option<i64>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at_ms, Some(deadline) if now_ms > deadline)
    }
}

pub struct TtlCache<V> {
    name: &'static str,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, default_ttl: Duration) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Inserts or fully replaces the entry under `key`.
    pub async fn set(&self, key: String, value: V, retention: Retention) {
        let entry = CacheEntry {
            value,
            expires_at_ms: expiry_deadline(self.default_ttl, retention),
        };
        self.entries.write().await.insert(key, entry);
    }

    /// All live values, in no particular order.
    pub async fn values(&self) -> Vec<V> {
        let now_ms = Utc::now().timestamp_millis();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now_ms))
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Number of entries physically present, expired or not.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn flush(&self) {
        self.entries.write().await.clear();
    }

    /// Takes every live value and empties the cache under one write lock, so
    /// a concurrent `set` lands either in the result or in the emptied cache.
    pub async fn drain(&self) -> Vec<V> {
        let now_ms = Utc::now().timestamp_millis();
        self.entries
            .write()
            .await
            .drain()
            .filter(|(_, entry)| !entry.is_expired(now_ms))
            .map(|(_, entry)| entry.value)
            .collect()
    }

    /// Removes expired entries and returns how many were dropped.
    pub async fn delete_expired(&self) -> usize {
        let now_ms = Utc::now().timestamp_millis();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now_ms));
        before - entries.len()
    }

    /// Runs `delete_expired` every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Stopping {} sweeper", self.name);
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = self.delete_expired().await;
                        if removed > 0 {
                            debug!("Swept {} expired entries from {}", removed, self.name);
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_never_expires() {
        assert_eq!(expiry_deadline(Duration::ZERO, Retention::Default), None);
        assert_eq!(expiry_deadline(Duration::from_secs(5), Retention::Never), None);
        assert!(expiry_deadline(Duration::from_secs(5), Retention::Default).is_some());
    }

    #[tokio::test]
    async fn test_set_replaces_entry() {
        let cache = TtlCache::new("test", Duration::from_secs(60));
        cache.set("a".to_string(), 1, Retention::Default).await;
        cache.set("a".to_string(), 2, Retention::Default).await;

        assert_eq!(cache.values().await, vec![2]);
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entries_hidden_before_sweep() {
        let cache = TtlCache::new("test", Duration::from_millis(20));
        cache.set("short".to_string(), 1, Retention::Default).await;
        cache.set("forever".to_string(), 2, Retention::Never).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.values().await, vec![2]);
        assert_eq!(cache.entry_count().await, 2);

        assert_eq!(cache.delete_expired().await, 1);
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_flush() {
        let cache = TtlCache::new("test", Duration::ZERO);
        cache.set("a".to_string(), 1, Retention::Default).await;
        cache.set("b".to_string(), 2, Retention::Never).await;

        cache.flush().await;

        assert!(cache.values().await.is_empty());
        assert_eq!(cache.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_drain_takes_live_values_and_empties() {
        let cache = TtlCache::new("test", Duration::from_millis(20));
        cache.set("short".to_string(), 1, Retention::Default).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.set("fresh".to_string(), 2, Retention::Default).await;
        cache.set("forever".to_string(), 3, Retention::Never).await;

        let mut drained = cache.drain().await;
        drained.sort();

        assert_eq!(drained, vec![2, 3]);
        assert_eq!(cache.entry_count().await, 0);
        assert!(cache.drain().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_drain_loses_no_concurrent_writes() {
        let cache = Arc::new(TtlCache::new("test", Duration::ZERO));
        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    cache.set(format!("k{}", i), i, Retention::Default).await;
                }
            })
        };

        let mut seen = Vec::new();
        while !writer.is_finished() {
            seen.extend(cache.drain().await);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        seen.extend(cache.drain().await);

        seen.sort();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = Arc::new(TtlCache::new("test", Duration::from_millis(10)));
        cache.set("a".to_string(), 1, Retention::Default).await;

        let shutdown = CancellationToken::new();
        let handle = cache
            .clone()
            .spawn_sweeper(Duration::from_millis(20), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.entry_count().await, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
