pub mod api;
pub mod cache;
pub mod errors;
pub mod models;
pub mod services;

use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use api::client::RestClient;
use api::endpoint::{RestEntityEndpoint, BANK_TRANSFERS_PATH, EXPENSES_PATH, RECEIVABLES_PATH};
use api::rates::RestRateSource;
use api::traits::{EntityEndpoint, RateSource};
use cache::query_cache::QueryCache;
use cache::registry::CacheRegistry;
use errors::CoreError;
use models::{
    cache_key::{CacheKey, CacheScope},
    finance::{BankTransfer, Expense, ReceivableInstallment},
    settings::{validate_currency_code, Settings},
    summary::FinancialSummary,
};
use services::{
    bank_statement::{bank_statement_service, BankStatementService},
    dashboard::summarize,
    entity_service::ServiceDeps,
    exchange_rates::ExchangeRateTable,
    expenses::{expenses_service, ExpensesService},
    notifications::NotificationLog,
    receivables::{receivables_service, ReceivablesService},
};

/// The backend collaborators `ZenithOps` talks to.
///
/// `ZenithOps::new` wires the REST implementations; tests and offline
/// embeddings pass their own through `ZenithOps::with_backends`.
pub struct Backends {
    pub rates: Box<dyn RateSource>,
    pub receivables: Arc<dyn EntityEndpoint<ReceivableInstallment>>,
    pub expenses: Arc<dyn EntityEndpoint<Expense>>,
    pub bank_transfers: Arc<dyn EntityEndpoint<BankTransfer>>,
}

impl Backends {
    pub fn rest(client: &RestClient) -> Self {
        Self {
            rates: Box::new(RestRateSource::new(client.clone())),
            receivables: Arc::new(RestEntityEndpoint::new(client.clone(), RECEIVABLES_PATH)),
            expenses: Arc::new(RestEntityEndpoint::new(client.clone(), EXPENSES_PATH)),
            bank_transfers: Arc::new(RestEntityEndpoint::new(client.clone(), BANK_TRANSFERS_PATH)),
        }
    }
}

/// Composition root of the back-office core.
///
/// Owns the exchange-rate table, every cache and every entity service for one
/// session. Nothing is global: consumers receive references from here.
#[must_use]
pub struct ZenithOps {
    settings: Settings,
    rates: Arc<ExchangeRateTable>,
    rate_source: Box<dyn RateSource>,
    expenses_endpoint: Arc<dyn EntityEndpoint<Expense>>,
    registry: Arc<CacheRegistry>,
    notifications: Arc<NotificationLog>,
    receivables: ReceivablesService,
    expenses: ExpensesService,
    bank_statement: BankStatementService,
    payables: Arc<QueryCache<Expense>>,
    dashboard: Arc<QueryCache<FinancialSummary>>,
}

impl std::fmt::Debug for ZenithOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenithOps")
            .field("api_base_url", &self.settings.api_base_url)
            .field("display_currency", &self.settings.display_currency)
            .field("rates", &self.rates.len())
            .field("caches", &self.registry.len())
            .finish()
    }
}

impl ZenithOps {
    /// Build a session against the REST backend described by `settings`.
    pub fn new(settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        let client = RestClient::new(&settings);
        let backends = Backends::rest(&client);
        Self::with_backends(settings, backends)
    }

    /// Build a session against explicit backends.
    pub fn with_backends(settings: Settings, backends: Backends) -> Result<Self, CoreError> {
        settings.validate()?;

        let receivables_cache = Arc::new(QueryCache::from_settings(&settings));
        let expenses_cache = Arc::new(QueryCache::from_settings(&settings));
        let transfers_cache = Arc::new(QueryCache::from_settings(&settings));
        let payables = Arc::new(QueryCache::from_settings(&settings));
        let dashboard = Arc::new(QueryCache::from_settings(&settings));

        let mut registry = CacheRegistry::new();
        registry.register(receivables_cache.clone());
        registry.register(expenses_cache.clone());
        registry.register(transfers_cache.clone());
        registry.register(payables.clone());
        registry.register(dashboard.clone());

        let deps = ServiceDeps {
            registry: Arc::new(registry),
            invalidation: settings.invalidation.clone(),
            notifications: Arc::new(NotificationLog::new()),
        };

        Ok(Self {
            rates: Arc::new(ExchangeRateTable::new()),
            rate_source: backends.rates,
            expenses_endpoint: Arc::clone(&backends.expenses),
            receivables: receivables_service(backends.receivables, receivables_cache, &deps),
            expenses: expenses_service(backends.expenses, expenses_cache, &deps),
            bank_statement: bank_statement_service(backends.bank_transfers, transfers_cache, &deps),
            registry: deps.registry,
            notifications: deps.notifications,
            payables,
            dashboard,
            settings,
        })
    }

    // ── Exchange rates ──────────────────────────────────────────────

    /// Load (or reload) the exchange-rate table. Never fails; see `ExchangeRateTable::load`.
    pub async fn load_rates(&self) {
        self.rates.load(self.rate_source.as_ref()).await;
    }

    pub fn rates(&self) -> &ExchangeRateTable {
        &self.rates
    }

    /// Shared handle to the rate table for consumers that outlive a borrow.
    pub fn rates_handle(&self) -> Arc<ExchangeRateTable> {
        Arc::clone(&self.rates)
    }

    pub fn convert_currency(&self, amount: f64, from: &str, to: &str) -> f64 {
        self.rates.convert_currency(amount, from, to)
    }

    /// Convert into the configured display currency.
    pub fn to_display_currency(&self, amount: f64, from: &str) -> f64 {
        self.rates
            .convert_currency(amount, from, &self.settings.display_currency)
    }

    // ── Entity services ─────────────────────────────────────────────

    pub fn receivables(&self) -> &ReceivablesService {
        &self.receivables
    }

    pub fn expenses(&self) -> &ExpensesService {
        &self.expenses
    }

    pub fn bank_statement(&self) -> &BankStatementService {
        &self.bank_statement
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notifications
    }

    // ── Derived views ───────────────────────────────────────────────

    /// Unpaid expenses under a `Payables` key, cached separately from the expenses list
    /// and invalidated whenever an expense mutation commits.
    pub async fn payables(&self, key: &CacheKey) -> Result<Vec<Expense>, CoreError> {
        if key.scope != CacheScope::Payables {
            return Err(CoreError::ValidationError(format!(
                "payables view cannot serve cache key {key}"
            )));
        }
        let expenses_key = CacheKey {
            scope: CacheScope::Expenses,
            ..key.clone()
        };
        let endpoint = Arc::clone(&self.expenses_endpoint);
        self.payables
            .fetch_with(key, || async move {
                endpoint.list(&expenses_key).await.map(|items| {
                    items
                        .into_iter()
                        .filter(|e| !e.paid)
                        .collect::<Vec<Expense>>()
                })
            })
            .await
    }

    /// Dashboard figures for a date range in the display currency.
    ///
    /// Cached under a `FinancialDashboard` key; any committed financial mutation
    /// invalidates it.
    pub async fn financial_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<FinancialSummary, CoreError> {
        if from > to {
            return Err(CoreError::ValidationError(format!(
                "'from' date ({from}) must not be after 'to' date ({to})"
            )));
        }

        let key = CacheKey::new(CacheScope::FinancialDashboard).with_range(from, to);
        if let Some(summary) = self.dashboard.get(&key).and_then(|v| v.into_iter().next()) {
            return Ok(summary);
        }

        let ticket = self.dashboard.begin_fetch(&key);
        let receivables = self
            .receivables
            .list(&CacheKey::new(CacheScope::Receivables).with_range(from, to))
            .await?;
        let expenses = self
            .expenses
            .list(&CacheKey::new(CacheScope::Expenses).with_range(from, to))
            .await?;
        let transfers = self
            .bank_statement
            .list(&CacheKey::new(CacheScope::BankStatement).with_range(from, to))
            .await?;

        let summary = summarize(
            &receivables,
            &expenses,
            &transfers,
            &self.settings.display_currency,
            &self.rates,
        );
        self.dashboard.complete_fetch(ticket, vec![summary.clone()]);
        Ok(summary)
    }

    // ── Settings & housekeeping ─────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Change the display currency. Must be 3 ASCII letters.
    /// Cached dashboard figures are invalidated since they are expressed in the old one.
    pub fn set_display_currency(&mut self, currency: &str) -> Result<(), CoreError> {
        self.settings.display_currency = validate_currency_code(currency)?;
        self.dashboard.invalidate_scope(CacheScope::FinancialDashboard);
        Ok(())
    }

    /// Mark every cached list under `scope` stale, in every cache.
    pub fn invalidate(&self, scope: CacheScope) -> usize {
        self.registry.invalidate(&[scope])
    }

    /// Drop cached lists older than the configured garbage-collection age.
    pub fn evict_expired(&self) -> usize {
        self.registry.evict_expired(Utc::now())
    }
}
