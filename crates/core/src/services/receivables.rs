use chrono::NaiveDate;
use std::sync::Arc;

use crate::api::traits::EntityEndpoint;
use crate::cache::query_cache::QueryCache;
use crate::errors::CoreError;
use crate::models::cache_key::{CacheKey, CacheScope};
use crate::models::finance::{NewReceivableInstallment, ReceivableInstallment};
use super::dashboard::sum_converted;
use super::entity_service::{EntityService, ServiceDeps};
use super::exchange_rates::ExchangeRateTable;

pub type ReceivablesService = EntityService<ReceivableInstallment>;

/// Receivable installments, typically backed by `RestEntityEndpoint` at `RECEIVABLES_PATH`.
pub fn receivables_service(
    endpoint: Arc<dyn EntityEndpoint<ReceivableInstallment>>,
    cache: Arc<QueryCache<ReceivableInstallment>>,
    deps: &ServiceDeps,
) -> ReceivablesService {
    EntityService::new(
        "receivable installment",
        CacheScope::Receivables,
        endpoint,
        cache,
        deps,
    )
}

impl EntityService<ReceivableInstallment> {
    /// Record an installment as collected on `paid_on`.
    pub async fn mark_paid(
        &self,
        key: &CacheKey,
        installment: &ReceivableInstallment,
        paid_on: NaiveDate,
    ) -> Result<ReceivableInstallment, CoreError> {
        let mut draft = NewReceivableInstallment::from(installment);
        draft.paid = true;
        draft.paid_on = Some(paid_on);
        self.update(key, &installment.id, draft).await
    }

    /// Unpaid installments under `key`, converted into `currency`.
    pub async fn outstanding_total(
        &self,
        key: &CacheKey,
        currency: &str,
        table: &ExchangeRateTable,
    ) -> Result<f64, CoreError> {
        let items = self.list(key).await?;
        let total = sum_converted(
            items.iter().filter(|r| !r.paid).map(|r| (r.amount, r.currency.as_str())),
            currency,
            table,
        );
        Ok(total.total)
    }
}
