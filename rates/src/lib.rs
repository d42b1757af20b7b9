//! Ratewatch Rates
//!
//! Rate aggregation and caching for fiat currencies and crypto assets.
//!
//! # Features
//!
//! - Fiat snapshots merged from a currency directory and four daily rate tables
//! - Crypto snapshots reconstructed from a ticker's price changes
//! - Per-reference TTL cache with single-flight refresh
//! - Upstream outages degrade to empty data instead of errors
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratewatch_common::Reference;
//! use ratewatch_rates::{CurrencyRatesService, FiatRatesService, HttpTransport, UpstreamConfig};
//!
//! let config = UpstreamConfig::from_env();
//! let transport = Arc::new(HttpTransport::new(config.request_timeout));
//! let fiat = FiatRatesService::fiat(&config, transport);
//!
//! let usd = fiat.get("usd", Reference::Eur).await;
//! let all = fiat.get_all(Reference::Eur).await;
//! ```

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fiat;
pub mod provider;
pub mod service;
pub mod transport;

pub use cache::{CacheStats, SnapshotCache, TtlCache};
pub use config::UpstreamConfig;
pub use crypto::CryptoClient;
pub use error::{RatesError, RatesResult};
pub use fiat::FiatClient;
pub use provider::SnapshotProvider;
pub use service::{CryptoRatesService, CurrencyRatesService, FiatRatesService, RatesService};
pub use transport::{HttpTransport, Transport, UpstreamResponse};
