use std::sync::Arc;

use crate::api::traits::EntityEndpoint;
use crate::cache::query_cache::QueryCache;
use crate::errors::CoreError;
use crate::models::cache_key::{CacheKey, CacheScope};
use crate::models::finance::BankTransfer;
use super::dashboard::sum_converted;
use super::entity_service::{EntityService, ServiceDeps};
use super::exchange_rates::ExchangeRateTable;

pub type BankStatementService = EntityService<BankTransfer>;

/// Bank transfers, listed per account via the key's account filter.
pub fn bank_statement_service(
    endpoint: Arc<dyn EntityEndpoint<BankTransfer>>,
    cache: Arc<QueryCache<BankTransfer>>,
    deps: &ServiceDeps,
) -> BankStatementService {
    EntityService::new(
        "bank transfer",
        CacheScope::BankStatement,
        endpoint,
        cache,
        deps,
    )
}

impl EntityService<BankTransfer> {
    /// Net of all movements under `key`, converted into `currency`.
    pub async fn balance_in(
        &self,
        key: &CacheKey,
        currency: &str,
        table: &ExchangeRateTable,
    ) -> Result<f64, CoreError> {
        let items = self.list(key).await?;
        Ok(sum_converted(items.iter().map(|t| (t.amount, t.currency.as_str())), currency, table).total)
    }
}
