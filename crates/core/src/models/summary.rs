use serde::{Deserialize, Serialize};

/// Financial dashboard figures, all expressed in `currency`.
///
/// Amounts in currencies the rate table cannot convert are added unconverted,
/// so totals are only as good as the loaded rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    /// Display currency of every monetary field
    pub currency: String,

    /// Unpaid receivable installments
    pub receivables_outstanding: f64,

    /// Receivable installments already collected
    pub receivables_collected: f64,

    /// Unpaid expenses (the payables view)
    pub payables_outstanding: f64,

    /// All expenses, paid or not
    pub expenses_total: f64,

    /// Sum of bank movements (inflows positive)
    pub bank_balance: f64,

    /// receivables_outstanding - payables_outstanding
    pub net_position: f64,

    /// Entries still awaiting backend confirmation
    pub speculative_entries: usize,

    /// Currencies encountered with no conversion path to `currency`
    pub unconverted_currencies: Vec<String>,
}
