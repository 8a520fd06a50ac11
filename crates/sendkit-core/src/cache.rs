//! Keyed, TTL-based cache stores for serialized request units.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CacheError;

pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Storage behind [`crate::caching::CachingSender`].
///
/// Values are opaque strings; expired entries must read as absent.
pub trait CacheStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()>;
}

impl<C: CacheStore + ?Sized> CacheStore for Arc<C> {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        (**self).get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
        (**self).set(key, value, ttl)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Minimum spacing between expiry sweeps triggered by writes.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    next_sweep: Option<Instant>,
}

impl CacheInner {
    fn get(&self, key: &str) -> Option<String> {
        self.map
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    fn put(&mut self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        if self.next_sweep.map_or(true, |due| now >= due) {
            self.clear_expired();
            self.next_sweep = Some(now + SWEEP_INTERVAL);
        }

        self.map.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    fn clear_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
    }
}

/// In-process cache shared by clones. Concurrent writers to one key: last
/// write wins.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops entries whose TTL has passed. Writes also sweep, at most once
    /// a minute.
    pub async fn clear_expired(&self) {
        self.inner.write().await.clear_expired();
    }

    pub async fn clear(&self) {
        self.inner.write().await.map.clear();
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CacheStore for MemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.inner.read().await.get(key)) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            if ttl.is_zero() {
                return Ok(());
            }
            self.inner.write().await.put(key, value, ttl);
            Ok(())
        })
    }
}
