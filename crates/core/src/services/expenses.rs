use std::sync::Arc;

use crate::api::traits::EntityEndpoint;
use crate::cache::query_cache::QueryCache;
use crate::errors::CoreError;
use crate::models::cache_key::{CacheKey, CacheScope};
use crate::models::finance::Expense;
use super::dashboard::sum_converted;
use super::entity_service::{EntityService, ServiceDeps};
use super::exchange_rates::ExchangeRateTable;

pub type ExpensesService = EntityService<Expense>;

/// Supplier expenses. Drafts with a receipt are sent as multipart.
pub fn expenses_service(
    endpoint: Arc<dyn EntityEndpoint<Expense>>,
    cache: Arc<QueryCache<Expense>>,
    deps: &ServiceDeps,
) -> ExpensesService {
    EntityService::new(
        "expense",
        CacheScope::Expenses,
        endpoint,
        cache,
        deps,
    )
}

impl EntityService<Expense> {
    /// Every expense under `key`, converted into `currency`.
    pub async fn total_in(
        &self,
        key: &CacheKey,
        currency: &str,
        table: &ExchangeRateTable,
    ) -> Result<f64, CoreError> {
        let items = self.list(key).await?;
        Ok(sum_converted(items.iter().map(|e| (e.amount, e.currency.as_str())), currency, table).total)
    }

    /// Unpaid expenses under `key`, newest due date last.
    pub async fn unpaid(&self, key: &CacheKey) -> Result<Vec<Expense>, CoreError> {
        let mut items: Vec<Expense> = self.list(key).await?.into_iter().filter(|e| !e.paid).collect();
        items.sort_by_key(|e| e.due_date.unwrap_or(e.date));
        Ok(items)
    }
}
