//! Reference currencies and symbol normalization.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Base currency in which every rate of a snapshot is denominated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reference {
    Eur,
    Usd,
}

impl Reference {
    /// All supported references.
    pub const ALL: [Reference; 2] = [Reference::Eur, Reference::Usd];

    /// Lowercase code, as used in URL paths and upstream payload keys.
    pub fn code(&self) -> &'static str {
        match self {
            Reference::Eur => "eur",
            Reference::Usd => "usd",
        }
    }

    /// Uppercase ISO 4217 code.
    pub fn iso_code(&self) -> &'static str {
        match self {
            Reference::Eur => "EUR",
            Reference::Usd => "USD",
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.iso_code())
    }
}

/// Error returned when parsing an unsupported reference code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported reference currency: {0}")]
pub struct UnsupportedReference(pub String);

impl FromStr for Reference {
    type Err = UnsupportedReference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::ALL
            .into_iter()
            .find(|r| r.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnsupportedReference(s.to_string()))
    }
}

/// Currency or crypto-asset ticker, always uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, normalizing case and surrounding whitespace.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(normalize_symbol(code.as_ref()))
    }

    /// Get the symbol code.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Uppercase form used for every externally visible key and lookup.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
