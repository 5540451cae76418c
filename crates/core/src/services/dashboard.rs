use std::collections::BTreeSet;

use crate::models::entity::OptimisticEntity;
use crate::models::finance::{BankTransfer, Expense, ReceivableInstallment};
use crate::models::summary::FinancialSummary;
use super::exchange_rates::ExchangeRateTable;

/// Sum of amounts converted into one currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedTotal {
    pub total: f64,
    /// Currencies that had no conversion path and were added as-is.
    pub unconverted: BTreeSet<String>,
}

impl ConvertedTotal {
    fn add(&mut self, amount: f64, from: &str, to: &str, table: &ExchangeRateTable) {
        match table.try_convert(amount, from, to) {
            Some(converted) => self.total += converted,
            None => {
                self.total += amount;
                self.unconverted.insert(from.trim().to_uppercase());
            }
        }
    }
}

/// Convert every `(amount, currency)` into `currency` and add them up.
pub fn sum_converted<'a, I>(items: I, currency: &str, table: &ExchangeRateTable) -> ConvertedTotal
where
    I: IntoIterator<Item = (f64, &'a str)>,
{
    let mut total = ConvertedTotal::default();
    for (amount, from) in items {
        total.add(amount, from, currency, table);
    }
    total
}

/// Build the dashboard figures from the three entity lists.
pub fn summarize(
    receivables: &[ReceivableInstallment],
    expenses: &[Expense],
    transfers: &[BankTransfer],
    currency: &str,
    table: &ExchangeRateTable,
) -> FinancialSummary {
    let currency = currency.trim().to_uppercase();

    let outstanding = sum_converted(
        receivables.iter().filter(|r| !r.paid).map(|r| (r.amount, r.currency.as_str())),
        &currency,
        table,
    );
    let collected = sum_converted(
        receivables.iter().filter(|r| r.paid).map(|r| (r.amount, r.currency.as_str())),
        &currency,
        table,
    );
    let payables = sum_converted(
        expenses.iter().filter(|e| !e.paid).map(|e| (e.amount, e.currency.as_str())),
        &currency,
        table,
    );
    let expenses_total = sum_converted(
        expenses.iter().map(|e| (e.amount, e.currency.as_str())),
        &currency,
        table,
    );
    let bank = sum_converted(
        transfers.iter().map(|t| (t.amount, t.currency.as_str())),
        &currency,
        table,
    );

    let speculative_entries = receivables.iter().filter(|r| r.is_speculative()).count()
        + expenses.iter().filter(|e| e.is_speculative()).count()
        + transfers.iter().filter(|t| t.is_speculative()).count();

    let unconverted: BTreeSet<String> = [&outstanding, &collected, &expenses_total, &bank]
        .iter()
        .flat_map(|t| t.unconverted.iter().cloned())
        .collect();

    FinancialSummary {
        currency,
        receivables_outstanding: outstanding.total,
        receivables_collected: collected.total,
        payables_outstanding: payables.total,
        expenses_total: expenses_total.total,
        bank_balance: bank.total,
        net_position: outstanding.total - payables.total,
        speculative_entries,
        unconverted_currencies: unconverted.into_iter().collect(),
    }
}
