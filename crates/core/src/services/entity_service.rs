use std::sync::Arc;

use crate::api::traits::EntityEndpoint;
use crate::cache::optimistic::{MutationChange, MutationState, OptimisticMutationCache};
use crate::cache::query_cache::QueryCache;
use crate::cache::registry::CacheRegistry;
use crate::errors::CoreError;
use crate::models::cache_key::{CacheKey, CacheScope};
use crate::models::entity::{EntityId, IntoMutationBody, OptimisticEntity};
use crate::models::settings::InvalidationMap;
use super::notifications::NotificationLog;

/// Session-wide collaborators every entity service needs.
#[derive(Clone)]
pub struct ServiceDeps {
    pub registry: Arc<CacheRegistry>,
    pub invalidation: InvalidationMap,
    pub notifications: Arc<NotificationLog>,
}

/// Read + mutate one entity type through the cache.
///
/// Reads are cache-aside. Mutations are optimistic: the cached list changes before the
/// request is sent, is rolled back if the request fails, and is invalidated and
/// refetched if it succeeds. Failures are reported once on the notification log and
/// returned to the caller; nothing is retried.
pub struct EntityService<T: OptimisticEntity> {
    label: &'static str,
    endpoint: Arc<dyn EntityEndpoint<T>>,
    mutations: OptimisticMutationCache<T>,
    notifications: Arc<NotificationLog>,
}

impl<T> EntityService<T>
where
    T: OptimisticEntity,
    T::Draft: IntoMutationBody,
{
    pub fn new(
        label: &'static str,
        scope: CacheScope,
        endpoint: Arc<dyn EntityEndpoint<T>>,
        cache: Arc<QueryCache<T>>,
        deps: &ServiceDeps,
    ) -> Self {
        Self {
            label,
            endpoint,
            mutations: OptimisticMutationCache::new(
                cache,
                Arc::clone(&deps.registry),
                scope,
                &deps.invalidation,
            ),
            notifications: Arc::clone(&deps.notifications),
        }
    }

    pub fn label(&self) -> &str {
        self.label
    }

    pub fn scope(&self) -> CacheScope {
        self.mutations.scope()
    }

    pub fn cache(&self) -> &Arc<QueryCache<T>> {
        self.mutations.cache()
    }

    pub fn mutation_state(&self, key: &CacheKey) -> MutationState {
        self.mutations.state_of(key)
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Cached list for `key`, fetched when missing or stale.
    pub async fn list(&self, key: &CacheKey) -> Result<Vec<T>, CoreError> {
        self.check_scope(key)?;
        self.cache()
            .fetch_with(key, || self.endpoint.list(key))
            .await
    }

    /// Force a refetch of `key`.
    pub async fn refresh(&self, key: &CacheKey) -> Result<Vec<T>, CoreError> {
        self.check_scope(key)?;
        self.cache()
            .refetch_with(key, || self.endpoint.list(key))
            .await
    }

    // ── Mutations ───────────────────────────────────────────────────

    pub async fn create(&self, key: &CacheKey, draft: T::Draft) -> Result<T, CoreError> {
        self.check_scope(key)?;
        let body = draft.to_body()?;
        let result = self
            .mutations
            .run(key, MutationChange::Create(draft), self.endpoint.create(body))
            .await;
        let created = self.report("create", result)?;
        self.reconcile(key).await;
        Ok(created)
    }

    pub async fn update(&self, key: &CacheKey, id: &EntityId, draft: T::Draft) -> Result<T, CoreError> {
        self.check_scope(key)?;
        Self::check_confirmed(id)?;
        let body = draft.to_body()?;
        let result = self
            .mutations
            .run(key, MutationChange::Update(id.clone(), draft), self.endpoint.update(id, body))
            .await;
        let updated = self.report("update", result)?;
        self.reconcile(key).await;
        Ok(updated)
    }

    pub async fn delete(&self, key: &CacheKey, id: &EntityId) -> Result<(), CoreError> {
        self.check_scope(key)?;
        Self::check_confirmed(id)?;
        let result = self
            .mutations
            .run(key, MutationChange::Delete(id.clone()), self.endpoint.delete(id))
            .await;
        self.report("delete", result)?;
        self.reconcile(key).await;
        Ok(())
    }

    // ── Internal ────────────────────────────────────────────────────

    /// Refetch after a committed mutation. A failure here is not rolled back:
    /// the list stays stale and the next read retries.
    async fn reconcile(&self, key: &CacheKey) {
        if let Err(e) = self.refresh(key).await {
            log::warn!("refetch of {key} after {} mutation failed: {e}", self.label);
        }
    }

    fn report<R>(&self, action: &str, result: Result<R, CoreError>) -> Result<R, CoreError> {
        if let Err(e) = &result {
            log::warn!("{} {action} failed: {e}", self.label);
            self.notifications
                .error(format!("Could not {action} {}", self.label), e.to_string());
        }
        result
    }

    fn check_scope(&self, key: &CacheKey) -> Result<(), CoreError> {
        if key.scope != self.scope() {
            return Err(CoreError::ValidationError(format!(
                "{} service cannot serve cache key {key}",
                self.label
            )));
        }
        Ok(())
    }

    fn check_confirmed(id: &EntityId) -> Result<(), CoreError> {
        if id.is_temporary() {
            return Err(CoreError::ValidationError(format!(
                "Entity {id} is still being created; wait for the backend to confirm it"
            )));
        }
        Ok(())
    }
}
