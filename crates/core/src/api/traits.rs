use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::cache_key::CacheKey;
use crate::models::entity::EntityId;
use crate::models::mutation::MutationBody;
use crate::models::rate::RawExchangeRate;

/// Source of the session's exchange-rate table.
///
/// The REST backend implements this in production; tests and offline
/// embeddings plug in their own.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait RateSource: Send + Sync {
    /// Human-readable name of this source (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch every known rate. Rate fields are returned raw; coercion happens in the table.
    async fn fetch_rates(&self) -> Result<Vec<RawExchangeRate>, CoreError>;
}

/// CRUD boundary for one entity type (bank transfers, expenses, receivable installments).
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait EntityEndpoint<T: Send + 'static>: Send + Sync {
    /// Human-readable name of this endpoint (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch the list addressed by `key` (date range and account filter applied server-side).
    async fn list(&self, key: &CacheKey) -> Result<Vec<T>, CoreError>;

    async fn create(&self, body: MutationBody) -> Result<T, CoreError>;

    async fn update(&self, id: &EntityId, body: MutationBody) -> Result<T, CoreError>;

    async fn delete(&self, id: &EntityId) -> Result<(), CoreError>;
}
