use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use crate::errors::CoreError;
use crate::models::cache_key::{CacheKey, CacheScope};
use crate::models::settings::{Settings, MAX_CACHE_TIME_SECS};

/// One cached list plus its freshness bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub items: Vec<T>,
    pub updated_at: DateTime<Utc>,
    /// Set by invalidation; cleared when a real fetch lands.
    pub stale: bool,
}

/// Proof that a read was started for `key` at a given fetch generation.
///
/// `cancel_fetches` bumps the generation, so results carried by an older
/// ticket are discarded instead of overwriting newer (optimistic) data.
/// An invalidation after `begin_fetch` lets the result land, but stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: CacheKey,
    generation: u64,
    epoch: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

struct Inner<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    generations: HashMap<CacheKey, u64>,
    /// Bumped by every invalidation; tickets record it at `begin_fetch`.
    epoch: u64,
    scope_invalidated: HashMap<CacheScope, u64>,
    key_invalidated: HashMap<CacheKey, u64>,
}

impl<T> Inner<T> {
    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn invalidated_since(&self, key: &CacheKey, epoch: u64) -> bool {
        let scope = self.scope_invalidated.get(&key.scope).copied().unwrap_or(0);
        let own = self.key_invalidated.get(key).copied().unwrap_or(0);
        scope.max(own) > epoch
    }
}

/// Keyed cache of entity lists with stale-while-revalidate semantics.
///
/// Cache strategy:
/// - An entry is **fresh** until it is invalidated or older than `stale_time`.
/// - `get` only serves fresh entries; `peek` serves whatever is there.
/// - Entries older than `gc_time` are dropped by `evict_expired`.
///
/// Shared by reference between readers and the optimistic mutation layer.
/// The internal lock is never held across an `.await`.
pub struct QueryCache<T> {
    inner: Mutex<Inner<T>>,
    stale_time: Duration,
    gc_time: Duration,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                generations: HashMap::new(),
                epoch: 0,
                scope_invalidated: HashMap::new(),
                key_invalidated: HashMap::new(),
            }),
            stale_time,
            gc_time,
        }
    }

    /// Durations above `MAX_CACHE_TIME_SECS` are clamped to it.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            cache_duration(settings.stale_time_secs),
            cache_duration(settings.gc_time_secs),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// The cached list for `key` if it is present and fresh.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<T>> {
        let now = Utc::now();
        let inner = self.lock();
        inner
            .entries
            .get(key)
            .filter(|e| !self.entry_is_stale(e, now))
            .map(|e| e.items.clone())
    }

    /// The cached list for `key` regardless of freshness.
    pub fn peek(&self, key: &CacheKey) -> Option<Vec<T>> {
        self.lock().entries.get(key).map(|e| e.items.clone())
    }

    /// Full entry (items + bookkeeping), used for snapshots.
    pub fn snapshot(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        self.lock().entries.get(key).cloned()
    }

    /// A missing entry counts as stale.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.is_stale_at(key, Utc::now())
    }

    pub fn is_stale_at(&self, key: &CacheKey, now: DateTime<Utc>) -> bool {
        self.lock()
            .entries
            .get(key)
            .map_or(true, |e| self.entry_is_stale(e, now))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_is_stale(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        entry.stale || now - entry.updated_at >= self.stale_time
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Store a list as fresh backend data.
    pub fn set(&self, key: CacheKey, items: Vec<T>) {
        self.lock().entries.insert(
            key,
            CacheEntry {
                items,
                updated_at: Utc::now(),
                stale: false,
            },
        );
    }

    /// Edit the cached list in place, keeping its freshness bookkeeping.
    /// A missing entry is created empty and marked stale, since it holds no backend data.
    pub fn modify<F: FnOnce(&mut Vec<T>)>(&self, key: &CacheKey, f: F) {
        let mut inner = self.lock();
        let entry = inner.entries.entry(key.clone()).or_insert_with(|| CacheEntry {
            items: Vec::new(),
            updated_at: Utc::now(),
            stale: true,
        });
        f(&mut entry.items);
    }

    /// Put back a snapshot taken with `snapshot`. `None` removes the key entirely.
    pub fn restore(&self, key: &CacheKey, snapshot: Option<CacheEntry<T>>) {
        let mut inner = self.lock();
        match snapshot {
            Some(entry) => {
                inner.entries.insert(key.clone(), entry);
            }
            None => {
                inner.entries.remove(key);
            }
        }
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Vec<T>> {
        self.lock().entries.remove(key).map(|e| e.items)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.generations.clear();
        inner.scope_invalidated.clear();
        inner.key_invalidated.clear();
    }

    // ── Invalidation & eviction ─────────────────────────────────────

    /// Mark one key stale. Returns whether it was cached.
    ///
    /// Reads already in flight for the key will store their result as stale.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut inner = self.lock();
        let epoch = inner.next_epoch();
        inner.key_invalidated.insert(key.clone(), epoch);
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Mark every key under `scope` stale. Returns how many entries were marked.
    ///
    /// Covers keys with a read in flight but no entry yet.
    pub fn invalidate_scope(&self, scope: CacheScope) -> usize {
        let mut inner = self.lock();
        let epoch = inner.next_epoch();
        inner.scope_invalidated.insert(scope, epoch);
        let mut marked = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if key.is_under(scope) {
                entry.stale = true;
                marked += 1;
            }
        }
        marked
    }

    /// Drop entries last written more than `gc_time` before `now`.
    /// Returns the number of entries removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let gc_time = self.gc_time;
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| now - e.updated_at <= gc_time);
        let Inner {
            entries,
            generations,
            key_invalidated,
            ..
        } = &mut *inner;
        generations.retain(|k, _| entries.contains_key(k));
        key_invalidated.retain(|k, _| entries.contains_key(k));
        before - entries.len()
    }

    // ── Fetch coordination ──────────────────────────────────────────

    /// Register the start of a read for `key`.
    pub fn begin_fetch(&self, key: &CacheKey) -> FetchTicket {
        let inner = self.lock();
        FetchTicket {
            key: key.clone(),
            generation: inner.generations.get(key).copied().unwrap_or(0),
            epoch: inner.epoch,
        }
    }

    /// Cancel every outstanding read for `key`: their results will be discarded.
    pub fn cancel_fetches(&self, key: &CacheKey) {
        let mut inner = self.lock();
        *inner.generations.entry(key.clone()).or_insert(0) += 1;
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.lock().generations.get(&ticket.key).copied().unwrap_or(0) == ticket.generation
    }

    /// Store the result of a read unless it was cancelled meanwhile.
    /// Returns whether the result was stored.
    ///
    /// A result whose key was invalidated after `begin_fetch` predates the change
    /// that caused the invalidation, so it is stored stale.
    pub fn complete_fetch(&self, ticket: FetchTicket, items: Vec<T>) -> bool {
        let mut inner = self.lock();
        let current = inner.generations.get(&ticket.key).copied().unwrap_or(0);
        if current != ticket.generation {
            log::debug!("discarding cancelled fetch for {}", ticket.key);
            return false;
        }
        let stale = inner.invalidated_since(&ticket.key, ticket.epoch);
        if stale {
            log::debug!("fetch for {} was overtaken by an invalidation; storing it stale", ticket.key);
        }
        inner.entries.insert(
            ticket.key,
            CacheEntry {
                items,
                updated_at: Utc::now(),
                stale,
            },
        );
        true
    }

    /// Cache-aside read: serve a fresh hit, otherwise run `fetch` and store its result.
    ///
    /// If the read is cancelled while in flight, the cached (optimistic) list wins
    /// and is returned instead of the fetched one.
    pub async fn fetch_with<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<Vec<T>, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, CoreError>>,
    {
        if let Some(items) = self.get(key) {
            return Ok(items);
        }
        self.refetch_with(key, fetch).await
    }

    /// Always run `fetch`, storing its result unless cancelled meanwhile.
    pub async fn refetch_with<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<Vec<T>, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, CoreError>>,
    {
        let ticket = self.begin_fetch(key);
        let items = fetch().await?;
        if self.complete_fetch(ticket, items.clone()) {
            return Ok(items);
        }
        Ok(self.peek(key).unwrap_or(items))
    }
}

fn cache_duration(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_CACHE_TIME_SECS) as i64)
}

impl<T: Clone> Default for QueryCache<T> {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
