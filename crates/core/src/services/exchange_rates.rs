use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::traits::RateSource;
use crate::models::rate::{ExchangeRate, RateCoercion, RawExchangeRate};

/// Intermediate currency for two-hop conversions.
pub const BRIDGE_CURRENCY: &str = "USD";

#[derive(Debug, Default)]
struct TableState {
    rates: Vec<ExchangeRate>,
    coercions: Vec<RateCoercion>,
    last_error: Option<String>,
    loaded: bool,
    /// Sequence number of the load that produced this state.
    load_seq: u64,
}

/// Session-wide table of directed exchange rates.
///
/// Built once by the composition root and shared by reference. `load` replaces the
/// whole table; nothing else mutates it. Lookups never fail: a missing path means
/// "no rate" (`get_rate`) or "amount unchanged" (`convert_currency`).
///
/// Conversion order in `convert_currency`:
/// 1. direct `from → to`
/// 2. reverse `to → from` (divided, only if nonzero)
/// 3. bridge `from → USD → to`
/// 4. reverse bridge `USD → from` (divided) then `USD → to`
///
/// `get_rate` stops after step 2 and never bridges.
#[derive(Debug, Default)]
pub struct ExchangeRateTable {
    state: RwLock<TableState>,
    in_flight: AtomicUsize,
    load_seq: AtomicU64,
}

impl ExchangeRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from already-parsed rates (offline use, tests).
    pub fn from_rates(rates: Vec<ExchangeRate>) -> Self {
        let table = Self::new();
        {
            let mut state = table.write();
            state.rates = dedupe(rates);
            state.loaded = true;
        }
        table
    }

    fn read(&self) -> RwLockReadGuard<'_, TableState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TableState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Fetch every rate from `source` and replace the table.
    ///
    /// Never fails: a fetch error empties the table and is kept in `last_error()`;
    /// malformed rate fields are coerced to zero and reported by `coercions()`.
    ///
    /// Overlapping loads are allowed. The most recently started one wins; an older
    /// load that finishes later is dropped.
    pub async fn load(&self, source: &dyn RateSource) {
        let seq = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = source.fetch_rates().await;

        let mut next = TableState {
            loaded: true,
            load_seq: seq,
            ..TableState::default()
        };
        match result {
            Ok(records) => {
                let mut rates = Vec::with_capacity(records.len());
                for record in &records {
                    let (rate, coercion) = coerce_rate(record);
                    rates.push(ExchangeRate::new(&record.from_currency, &record.to_currency, rate));
                    next.coercions.extend(coercion);
                }
                next.rates = dedupe(rates);
                log::info!(
                    "loaded {} exchange rates from {} ({} coerced to zero)",
                    next.rates.len(),
                    source.name(),
                    next.coercions.len()
                );
            }
            Err(e) => {
                log::warn!("failed to load exchange rates from {}: {e}", source.name());
                next.last_error = Some(e.to_string());
            }
        }

        {
            let mut state = self.write();
            if state.load_seq < seq {
                *state = next;
            } else {
                log::debug!("discarding exchange rates from {}: a newer load finished first", source.name());
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// True while at least one `load` is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// True once a load (successful or not) has completed, or for tables built from rates.
    pub fn is_loaded(&self) -> bool {
        self.read().loaded
    }

    /// Message of the last failed load, cleared by the next successful one.
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    /// Rate fields from the last load that were coerced to zero.
    pub fn coercions(&self) -> Vec<RateCoercion> {
        self.read().coercions.clone()
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn rates(&self) -> Vec<ExchangeRate> {
        self.read().rates.clone()
    }

    pub fn len(&self) -> usize {
        self.read().rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().rates.is_empty()
    }

    /// Every currency code that appears on either side of a stored rate, sorted.
    pub fn available_currencies(&self) -> Vec<String> {
        let state = self.read();
        let codes: BTreeSet<&str> = state
            .rates
            .iter()
            .flat_map(|r| [r.from_currency.as_str(), r.to_currency.as_str()])
            .collect();
        codes.into_iter().map(String::from).collect()
    }

    // ── Lookup & conversion ─────────────────────────────────────────

    /// The stored rate for the ordered pair, zero included.
    fn stored(state: &TableState, from: &str, to: &str) -> Option<f64> {
        state.rates.iter().find(|r| r.is_pair(from, to)).map(|r| r.rate)
    }

    /// The stored rate for the ordered pair, treating zero as absent.
    fn usable(state: &TableState, from: &str, to: &str) -> Option<f64> {
        Self::stored(state, from, to).filter(|r| *r != 0.0)
    }

    /// Rate to multiply a `from` amount by to get a `to` amount.
    ///
    /// `1.0` for identical codes, else the direct stored rate, else the reciprocal of a
    /// nonzero reverse rate, else `None`. Does not bridge through USD.
    ///
    /// A stored direct rate of zero is returned as `Some(0.0)`, while `convert_currency`
    /// skips it and looks for another path. The two can disagree on such a pair.
    pub fn get_rate(&self, from: &str, to: &str) -> Option<f64> {
        let from = normalize(from);
        let to = normalize(to);
        if from == to {
            return Some(1.0);
        }

        let state = self.read();
        if let Some(rate) = Self::stored(&state, &from, &to) {
            return Some(rate);
        }
        Self::usable(&state, &to, &from).map(|reverse| 1.0 / reverse)
    }

    /// Convert `amount` from one currency to another.
    ///
    /// Returns `amount` unchanged, with a warning, when no path exists. Callers must
    /// not assume the result is expressed in `to`. No rounding is applied.
    pub fn convert_currency(&self, amount: f64, from: &str, to: &str) -> f64 {
        self.try_convert(amount, from, to).unwrap_or_else(|| {
            log::warn!("no exchange rate path from {from} to {to}; amount left unconverted");
            amount
        })
    }

    /// Like `convert_currency`, but `None` when no path exists.
    pub fn try_convert(&self, amount: f64, from: &str, to: &str) -> Option<f64> {
        let from = normalize(from);
        let to = normalize(to);
        if from == to {
            return Some(amount);
        }

        let state = self.read();

        if let Some(rate) = Self::usable(&state, &from, &to) {
            return Some(amount * rate);
        }

        if let Some(reverse) = Self::usable(&state, &to, &from) {
            return Some(amount / reverse);
        }

        let usd_to_target = Self::usable(&state, BRIDGE_CURRENCY, &to);

        if let (Some(to_usd), Some(usd_to)) = (Self::usable(&state, &from, BRIDGE_CURRENCY), usd_to_target) {
            return Some(amount * to_usd * usd_to);
        }

        if let (Some(usd_from), Some(usd_to)) = (Self::usable(&state, BRIDGE_CURRENCY, &from), usd_to_target) {
            return Some((amount / usd_from) * usd_to);
        }

        None
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Keep one rate per ordered pair; a later duplicate replaces an earlier one.
fn dedupe(rates: Vec<ExchangeRate>) -> Vec<ExchangeRate> {
    let mut unique: Vec<ExchangeRate> = Vec::with_capacity(rates.len());
    for rate in rates {
        match unique
            .iter_mut()
            .find(|r| r.is_pair(&rate.from_currency, &rate.to_currency))
        {
            Some(existing) => {
                log::warn!(
                    "duplicate exchange rate {}→{}: {} replaces {}",
                    rate.from_currency,
                    rate.to_currency,
                    rate.rate,
                    existing.rate
                );
                *existing = rate;
            }
            None => unique.push(rate),
        }
    }
    unique
}

/// Parse a wire rate field into a number, falling back to `0.0`.
///
/// Accepts JSON numbers and numeric strings (surrounding whitespace allowed).
/// Anything else, including non-finite values, becomes `0.0`: the record is kept
/// but inert, a warning is logged and a `RateCoercion` describes what was dropped.
pub fn coerce_rate(record: &RawExchangeRate) -> (f64, Option<RateCoercion>) {
    let parsed = match &record.rate {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed.filter(|r| r.is_finite()) {
        Some(rate) => (rate, None),
        None => {
            let raw = record.rate.to_string();
            log::warn!(
                "unparseable exchange rate {} for {}→{}; using 0",
                raw,
                record.from_currency,
                record.to_currency
            );
            (
                0.0,
                Some(RateCoercion {
                    from_currency: record.from_currency.trim().to_uppercase(),
                    to_currency: record.to_currency.trim().to_uppercase(),
                    raw,
                }),
            )
        }
    }
}
