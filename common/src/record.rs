//! Rate records and snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reference::Symbol;

/// Decimal places kept on every published value.
pub const RATE_DECIMAL_PLACES: u32 = 4;

/// Reserved value for a horizon the provider had no data for.
///
/// Rates are always positive, so `-1` never collides with a real quote.
pub const MISSING_RATE: Decimal = Decimal::NEGATIVE_ONE;

/// Round a rate to [`RATE_DECIMAL_PLACES`].
pub fn round_rate(value: Decimal) -> Decimal {
    value.round_dp(RATE_DECIMAL_PLACES)
}

/// Current and historical value of one currency relative to a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecord {
    /// Uppercase ticker.
    pub symbol: Symbol,
    /// Human-readable display name.
    pub name: String,
    /// Current value.
    pub value: Decimal,
    /// Value one day ago, or [`MISSING_RATE`].
    pub value_1d: Decimal,
    /// Value seven days ago, or [`MISSING_RATE`].
    pub value_7d: Decimal,
    /// Value thirty days ago, or [`MISSING_RATE`].
    pub value_30d: Decimal,
}

impl RateRecord {
    /// Create a record. Every value is rounded; `None` horizons become [`MISSING_RATE`].
    pub fn new(
        symbol: impl Into<Symbol>,
        name: impl Into<String>,
        value: Decimal,
        value_1d: Option<Decimal>,
        value_7d: Option<Decimal>,
        value_30d: Option<Decimal>,
    ) -> Self {
        let historical = |v: Option<Decimal>| v.map(round_rate).unwrap_or(MISSING_RATE);

        Self {
            symbol: symbol.into(),
            name: name.into(),
            value: round_rate(value),
            value_1d: historical(value_1d),
            value_7d: historical(value_7d),
            value_30d: historical(value_30d),
        }
    }
}

/// Complete rate table for one reference, ordered by symbol.
///
/// A snapshot is built once from an upstream fetch and never mutated; a
/// refresh produces a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    rates: BTreeMap<Symbol, RateRecord>,
}

impl Snapshot {
    /// An empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a symbol in any case.
    pub fn get(&self, symbol: &str) -> Option<&RateRecord> {
        self.rates.get(Symbol::new(symbol).code())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Whether the snapshot has no records.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Records in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &RateRecord> {
        self.rates.values()
    }

    /// Symbols in ascending order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.rates.keys()
    }
}

impl FromIterator<RateRecord> for Snapshot {
    /// Later records replace earlier ones with the same symbol.
    fn from_iter<I: IntoIterator<Item = RateRecord>>(iter: I) -> Self {
        let rates = iter
            .into_iter()
            .map(|record| (record.symbol.clone(), record))
            .collect();
        Self { rates }
    }
}
