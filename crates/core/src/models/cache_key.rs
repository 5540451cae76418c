use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The entity type or derived view a cached list belongs to.
///
/// Invalidation works at scope granularity: invalidating `Expenses` marks every
/// expenses list stale, whatever its date range or account filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CacheScope {
    BankStatement,
    Expenses,
    Receivables,
    Payables,
    FinancialDashboard,
}

impl std::fmt::Display for CacheScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheScope::BankStatement => write!(f, "bank-statement"),
            CacheScope::Expenses => write!(f, "expenses"),
            CacheScope::Receivables => write!(f, "receivables"),
            CacheScope::Payables => write!(f, "payables"),
            CacheScope::FinancialDashboard => write!(f, "financial-dashboard"),
        }
    }
}

/// Composite cache key: scope + optional inclusive date range + optional account filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub scope: CacheScope,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub account: Option<String>,
}

impl CacheKey {
    /// Key covering the whole scope, with no range or account filter.
    pub fn new(scope: CacheScope) -> Self {
        Self {
            scope,
            from: None,
            to: None,
            account: None,
        }
    }

    pub fn with_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Whether this key falls under `scope` for invalidation purposes.
    pub fn is_under(&self, scope: CacheScope) -> bool {
        self.scope == scope
    }

    /// Query-string parameters for the list endpoint, in a stable order.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(from) = self.from {
            params.push(("from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            params.push(("to", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(account) = &self.account {
            params.push(("account", account.clone()));
        }
        params
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.scope)?;
        if let (Some(from), Some(to)) = (self.from, self.to) {
            write!(f, "[{from}..{to}]")?;
        }
        if let Some(account) = &self.account {
            write!(f, "@{account}")?;
        }
        Ok(())
    }
}
