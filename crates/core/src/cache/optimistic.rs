use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::errors::CoreError;
use crate::models::cache_key::{CacheKey, CacheScope};
use crate::models::entity::{EntityId, OptimisticEntity};
use crate::models::settings::InvalidationMap;
use super::query_cache::{CacheEntry, QueryCache};
use super::registry::CacheRegistry;

/// Lifecycle of one mutation: `Idle → Pending → {Committed, RolledBack}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

impl std::fmt::Display for MutationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationState::Idle => write!(f, "Idle"),
            MutationState::Pending => write!(f, "Pending"),
            MutationState::Committed => write!(f, "Committed"),
            MutationState::RolledBack => write!(f, "RolledBack"),
        }
    }
}

/// The tentative change applied to the cached list while the request is in flight.
#[derive(Debug, Clone)]
pub enum MutationChange<T: OptimisticEntity> {
    /// Prepend a placeholder with a fresh temporary id.
    Create(T::Draft),
    /// Replace the entity with a placeholder that keeps its id.
    Update(EntityId, T::Draft),
    /// Remove the entity.
    Delete(EntityId),
}

/// Rollback context returned by `on_mutation_start`.
#[derive(Debug)]
pub struct MutationContext<T> {
    key: CacheKey,
    /// Outer `Option`: snapshot still held. Inner: whether the key was cached at all.
    snapshot: Option<Option<CacheEntry<T>>>,
    temp_id: Option<EntityId>,
    state: MutationState,
}

impl<T> MutationContext<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Temporary id of the speculative entry, for create mutations.
    pub fn temp_id(&self) -> Option<&EntityId> {
        self.temp_id.as_ref()
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// The pre-mutation list, while the mutation is pending. `None` items mean nothing was cached.
    pub fn snapshot_items(&self) -> Option<&[T]> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.as_ref())
            .map(|e| e.items.as_slice())
    }

    fn ensure_pending(&self) -> Result<(), CoreError> {
        if self.state != MutationState::Pending {
            return Err(CoreError::InvalidMutationState(self.state.to_string()));
        }
        Ok(())
    }
}

/// "Insert now, reconcile later" over a `QueryCache`, with guaranteed rollback.
///
/// - **start**: cancel in-flight reads for the key, snapshot it, apply the change.
/// - **success**: drop the snapshot, mark the key's scope and its dependent scopes stale.
/// - **error**: restore the snapshot exactly.
///
/// Concurrent mutations on one key are not serialized: a second start snapshots a
/// list that already holds the first speculative entry, and whichever settles last wins.
pub struct OptimisticMutationCache<T: OptimisticEntity> {
    cache: Arc<QueryCache<T>>,
    registry: Arc<CacheRegistry>,
    scope: CacheScope,
    dependents: Vec<CacheScope>,
    states: Mutex<HashMap<CacheKey, MutationState>>,
}

impl<T: OptimisticEntity> OptimisticMutationCache<T> {
    pub fn new(
        cache: Arc<QueryCache<T>>,
        registry: Arc<CacheRegistry>,
        scope: CacheScope,
        invalidation: &InvalidationMap,
    ) -> Self {
        let dependents = invalidation
            .scopes_for(scope)
            .into_iter()
            .filter(|s| *s != scope)
            .collect();
        Self {
            cache,
            registry,
            scope,
            dependents,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache<T>> {
        &self.cache
    }

    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    /// Scopes of other views invalidated on success.
    pub fn dependents(&self) -> &[CacheScope] {
        &self.dependents
    }

    /// State of the most recent transition for `key`.
    pub fn state_of(&self, key: &CacheKey) -> MutationState {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(MutationState::Idle)
    }

    fn record(&self, key: &CacheKey, state: MutationState) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), state);
    }

    /// Apply `change` to the cached list for `key` ahead of the backend.
    pub fn on_mutation_start(&self, key: &CacheKey, change: &MutationChange<T>) -> MutationContext<T> {
        self.cache.cancel_fetches(key);
        let snapshot = self.cache.snapshot(key);

        let mut temp_id = None;
        match change {
            MutationChange::Create(draft) => {
                let id = EntityId::temporary();
                let placeholder = T::placeholder(draft, id.clone());
                self.cache.modify(key, |items| items.insert(0, placeholder));
                temp_id = Some(id);
            }
            MutationChange::Update(id, draft) => {
                let placeholder = T::placeholder(draft, id.clone());
                self.cache.modify(key, |items| {
                    if let Some(slot) = items.iter_mut().find(|e| e.id() == id) {
                        *slot = placeholder;
                    }
                });
            }
            MutationChange::Delete(id) => {
                self.cache.modify(key, |items| items.retain(|e| e.id() != id));
            }
        }

        log::debug!("optimistic {} mutation started for {key}", self.scope);
        self.record(key, MutationState::Pending);
        MutationContext {
            key: key.clone(),
            snapshot: Some(snapshot),
            temp_id,
            state: MutationState::Pending,
        }
    }

    /// Commit: drop the snapshot and mark the key's scope plus dependents stale.
    /// Returns how many cached lists were marked.
    pub fn on_mutation_success(&self, ctx: &mut MutationContext<T>) -> Result<usize, CoreError> {
        ctx.ensure_pending()?;
        ctx.snapshot = None;
        ctx.state = MutationState::Committed;

        let mut marked = self.cache.invalidate_scope(ctx.key.scope);
        marked += self.registry.invalidate(&self.dependents);

        self.record(&ctx.key, MutationState::Committed);
        Ok(marked)
    }

    /// Roll back: restore the list exactly as it was before `on_mutation_start`.
    pub fn on_mutation_error(&self, ctx: &mut MutationContext<T>) -> Result<(), CoreError> {
        ctx.ensure_pending()?;
        let snapshot = ctx.snapshot.take().flatten();
        self.cache.restore(&ctx.key, snapshot);
        ctx.state = MutationState::RolledBack;

        log::debug!("optimistic {} mutation rolled back for {}", self.scope, ctx.key);
        self.record(&ctx.key, MutationState::RolledBack);
        Ok(())
    }

    /// Full lifecycle: start, await `request`, then commit or roll back.
    ///
    /// `request` is not polled until the optimistic change is visible.
    /// Its failure is returned as `CoreError::Mutation`.
    pub async fn run<R, Fut>(
        &self,
        key: &CacheKey,
        change: MutationChange<T>,
        request: Fut,
    ) -> Result<R, CoreError>
    where
        Fut: Future<Output = Result<R, CoreError>>,
    {
        let mut ctx = self.on_mutation_start(key, &change);
        match request.await {
            Ok(result) => {
                self.on_mutation_success(&mut ctx)?;
                Ok(result)
            }
            Err(e) => {
                self.on_mutation_error(&mut ctx)?;
                Err(CoreError::Mutation {
                    entity: self.scope.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}
