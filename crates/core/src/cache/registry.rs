use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::cache_key::CacheScope;
use super::query_cache::QueryCache;

/// Type-erased view of a cache, so one mutation can invalidate lists of other entity types.
pub trait ScopedCache: Send + Sync {
    /// Mark every entry under `scope` stale; returns how many were marked.
    fn invalidate_scope(&self, scope: CacheScope) -> usize;

    /// Drop expired entries; returns how many were dropped.
    fn evict_expired(&self, now: DateTime<Utc>) -> usize;
}

impl<T: Clone + Send + 'static> ScopedCache for QueryCache<T> {
    fn invalidate_scope(&self, scope: CacheScope) -> usize {
        QueryCache::invalidate_scope(self, scope)
    }

    fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        QueryCache::evict_expired(self, now)
    }
}

/// Every cache in the session, for cross-cutting invalidation and eviction.
#[derive(Default)]
pub struct CacheRegistry {
    caches: Vec<Arc<dyn ScopedCache>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, cache: Arc<dyn ScopedCache>) {
        self.caches.push(cache);
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Mark every entry under any of `scopes`, in any registered cache, stale.
    pub fn invalidate(&self, scopes: &[CacheScope]) -> usize {
        let mut marked = 0;
        for scope in scopes {
            for cache in &self.caches {
                marked += cache.invalidate_scope(*scope);
            }
        }
        log::debug!("invalidated {marked} cached lists for {scopes:?}");
        marked
    }

    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        self.caches.iter().map(|c| c.evict_expired(now)).sum()
    }
}
