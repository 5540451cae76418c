use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

use crate::errors::CoreError;
use crate::models::cache_key::CacheKey;
use crate::models::entity::EntityId;
use crate::models::mutation::MutationBody;
use super::client::RestClient;
use super::traits::EntityEndpoint;

pub const BANK_TRANSFERS_PATH: &str = "finance/bank-transfers";
pub const EXPENSES_PATH: &str = "finance/expenses";
pub const RECEIVABLES_PATH: &str = "finance/receivables";

/// Conventional REST resource: `GET/POST {path}/`, `PUT/DELETE {path}/{id}/`.
///
/// List responses may be paginated (`{"results": [...]}`) or a bare array.
pub struct RestEntityEndpoint<T> {
    client: RestClient,
    path: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> RestEntityEndpoint<T> {
    pub fn new(client: RestClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into().trim_matches('/').to_string(),
            _entity: PhantomData,
        }
    }

    pub fn collection_path(&self) -> String {
        format!("{}/", self.path)
    }

    /// Path of a single backend entity. Temporary ids exist only in the local cache.
    pub fn item_path(&self, id: &EntityId) -> Result<String, CoreError> {
        if id.is_temporary() {
            return Err(CoreError::ValidationError(format!(
                "Entity {id} has not been confirmed by the backend yet"
            )));
        }
        Ok(format!("{}/{}/", self.path, id))
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ListEnvelope<T> {
    Paginated { results: Vec<T> },
    Bare(Vec<T>),
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<T> EntityEndpoint<T> for RestEntityEndpoint<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn name(&self) -> &str {
        &self.path
    }

    async fn list(&self, key: &CacheKey) -> Result<Vec<T>, CoreError> {
        let envelope: ListEnvelope<T> = self
            .client
            .get_json(&self.collection_path(), &key.query_params())
            .await?;
        Ok(match envelope {
            ListEnvelope::Paginated { results } => results,
            ListEnvelope::Bare(items) => items,
        })
    }

    async fn create(&self, body: MutationBody) -> Result<T, CoreError> {
        self.client
            .send_body(Method::POST, &self.collection_path(), body)
            .await
    }

    async fn update(&self, id: &EntityId, body: MutationBody) -> Result<T, CoreError> {
        let path = self.item_path(id)?;
        self.client.send_body(Method::PUT, &path, body).await
    }

    async fn delete(&self, id: &EntityId) -> Result<(), CoreError> {
        let path = self.item_path(id)?;
        self.client.delete(&path).await
    }
}
