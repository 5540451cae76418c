use serde::{Deserialize, Serialize};

/// A single directed exchange rate: `amount_in_to = amount_in_from * rate`.
///
/// Codes are stored uppercased. The table holding these may be asymmetric:
/// `EUR→USD` and `USD→EUR` are independent entries and need not be reciprocals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
}

impl ExchangeRate {
    pub fn new(from: impl Into<String>, to: impl Into<String>, rate: f64) -> Self {
        Self {
            from_currency: from.into().trim().to_uppercase(),
            to_currency: to.into().trim().to_uppercase(),
            rate,
        }
    }

    /// True when this entry describes the ordered pair `from → to`.
    /// Expects uppercased codes.
    pub fn is_pair(&self, from: &str, to: &str) -> bool {
        self.from_currency == from && self.to_currency == to
    }
}

/// Wire record returned by the exchange-rate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    /// Number, numeric string, or anything else the backend sends; see `coerce_rate`.
    #[serde(default)]
    pub rate: serde_json::Value,
}

/// The rate list is served either paginated-style (`{"results": [...]}`) or as a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RatesEnvelope {
    Paginated { results: Vec<RawExchangeRate> },
    Bare(Vec<RawExchangeRate>),
}

impl RatesEnvelope {
    pub fn into_records(self) -> Vec<RawExchangeRate> {
        match self {
            RatesEnvelope::Paginated { results } => results,
            RatesEnvelope::Bare(records) => records,
        }
    }
}

/// Diagnostic recorded when a rate field could not be parsed and was coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCoercion {
    pub from_currency: String,
    pub to_currency: String,
    /// The offending raw value, rendered for display.
    pub raw: String,
}
