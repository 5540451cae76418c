use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CoreError;
use super::cache_key::CacheScope;

/// Which scopes each mutation invalidates on success, keyed by the mutated entity's scope.
///
/// The mutated scope itself is always invalidated, whether or not it is listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvalidationMap(BTreeMap<CacheScope, BTreeSet<CacheScope>>);

impl InvalidationMap {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn declare(mut self, mutated: CacheScope, dependents: &[CacheScope]) -> Self {
        self.0
            .entry(mutated)
            .or_default()
            .extend(dependents.iter().copied());
        self
    }

    /// Every scope to mark stale after a successful mutation on `mutated`, in a stable order.
    pub fn scopes_for(&self, mutated: CacheScope) -> Vec<CacheScope> {
        let mut scopes: BTreeSet<CacheScope> = self.0.get(&mutated).cloned().unwrap_or_default();
        scopes.insert(mutated);
        scopes.into_iter().collect()
    }
}

impl Default for InvalidationMap {
    fn default() -> Self {
        Self::empty()
            .declare(
                CacheScope::BankStatement,
                &[CacheScope::BankStatement, CacheScope::FinancialDashboard],
            )
            .declare(
                CacheScope::Expenses,
                &[
                    CacheScope::Expenses,
                    CacheScope::Payables,
                    CacheScope::FinancialDashboard,
                ],
            )
            .declare(
                CacheScope::Receivables,
                &[CacheScope::Receivables, CacheScope::FinancialDashboard],
            )
    }
}

/// Upper bound for `stale_time_secs` and `gc_time_secs` (ten years).
pub const MAX_CACHE_TIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Runtime configuration, handed to `ZenithOps` by the embedding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the REST backend, without a trailing slash (e.g. "https://ops.example.com/api").
    pub api_base_url: String,

    /// Bearer token for the backend. Injected explicitly; never read from ambient storage.
    pub auth_token: Option<String>,

    /// Per-request timeout, ignored on wasm32.
    pub request_timeout_secs: u64,

    /// Age after which a cached list is considered stale. Zero means stale immediately.
    pub stale_time_secs: u64,

    /// Age after which an unused cached list is evicted.
    pub gc_time_secs: u64,

    /// Currency for converted totals (e.g. "USD", "CLP", "EUR").
    pub display_currency: String,

    /// Dependent-key invalidation table.
    pub invalidation: InvalidationMap,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            auth_token: None,
            request_timeout_secs: 30,
            stale_time_secs: 0,
            gc_time_secs: 300,
            display_currency: "USD".to_string(),
            invalidation: InvalidationMap::default(),
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("Failed to parse settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(CoreError::Config(format!(
                "api_base_url must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }
        validate_currency_code(&self.display_currency)
            .map_err(|e| CoreError::Config(e.to_string()))?;
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config("request_timeout_secs must be positive".into()));
        }
        for (field, secs) in [
            ("stale_time_secs", self.stale_time_secs),
            ("gc_time_secs", self.gc_time_secs),
        ] {
            if secs > MAX_CACHE_TIME_SECS {
                return Err(CoreError::Config(format!(
                    "{field} must be at most {MAX_CACHE_TIME_SECS}, got {secs}"
                )));
            }
        }
        Ok(())
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

/// Currency codes must be exactly 3 ASCII letters (e.g., USD, EUR, CLP).
pub fn validate_currency_code(code: &str) -> Result<String, CoreError> {
    let trimmed = code.trim().to_uppercase();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::ValidationError(format!(
            "Invalid currency code '{code}': must be exactly 3 ASCII letters (e.g., USD, EUR, CLP)"
        )));
    }
    Ok(trimmed)
}
