//! Crypto-asset rates from a ticker endpoint.
//!
//! The ticker reports each asset's current price together with the absolute
//! price change over 1, 7 and 30 days; historical values are reconstructed
//! as `price - price_change`.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ratewatch_common::{RateRecord, Reference, Snapshot};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::{api_key, UpstreamConfig};
use crate::error::{RatesError, RatesResult};
use crate::provider::SnapshotProvider;
use crate::transport::Transport;

const TICKER_PROVIDER: &str = "nomics";

/// Numeric field that may arrive as a JSON string or number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DecimalField {
    Text(String),
    Number(f64),
}

impl DecimalField {
    fn parse(&self) -> RatesResult<Decimal> {
        match self {
            DecimalField::Text(text) => Decimal::from_str(text.trim())
                .map_err(|e| RatesError::malformed(TICKER_PROVIDER, format!("{}: {:?}", e, text))),
            DecimalField::Number(n) => Decimal::try_from(*n)
                .map_err(|e| RatesError::malformed(TICKER_PROVIDER, format!("{}: {}", e, n))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntervalChange {
    price_change: Option<DecimalField>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    symbol: String,
    name: String,
    price: DecimalField,
    #[serde(rename = "1d")]
    one_day: Option<IntervalChange>,
    #[serde(rename = "7d")]
    seven_days: Option<IntervalChange>,
    #[serde(rename = "30d")]
    thirty_days: Option<IntervalChange>,
}

impl TickerEntry {
    fn into_record(self) -> RatesResult<RateRecord> {
        let price = self.price.parse()?;
        let historical = |change: &Option<IntervalChange>| -> RatesResult<Option<Decimal>> {
            match change.as_ref().and_then(|c| c.price_change.as_ref()) {
                Some(delta) => Ok(Some(price - delta.parse()?)),
                None => Ok(None),
            }
        };

        Ok(RateRecord::new(
            self.symbol.as_str(),
            self.name.clone(),
            price,
            historical(&self.one_day)?,
            historical(&self.seven_days)?,
            historical(&self.thirty_days)?,
        ))
    }
}

/// Crypto upstream client.
pub struct CryptoClient {
    transport: Arc<dyn Transport>,
    ticker_url: String,
    ticker_key_var: String,
    ticker_limit: u32,
}

impl CryptoClient {
    pub fn new(config: &UpstreamConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            ticker_url: config.ticker_url.trim_end_matches('/').to_string(),
            ticker_key_var: config.ticker_key_var.clone(),
            ticker_limit: config.ticker_limit,
        }
    }

    fn ticker_request_url(&self, key: &str, reference: Reference) -> String {
        format!(
            "{}/v1/currencies/ticker?key={}&interval=1d,7d,30d&convert={}&per-page={}&page=1",
            self.ticker_url,
            key,
            reference.iso_code(),
            self.ticker_limit
        )
    }
}

#[async_trait]
impl SnapshotProvider for CryptoClient {
    fn name(&self) -> &'static str {
        "crypto"
    }

    #[instrument(skip(self), fields(reference = %reference))]
    async fn fetch_snapshot(&self, reference: Reference) -> RatesResult<Snapshot> {
        let response = match api_key(&self.ticker_key_var) {
            Ok(key) => {
                let url = self.ticker_request_url(&key, reference);
                self.transport
                    .get(TICKER_PROVIDER, &url)
                    .await
                    .and_then(|r| r.ensure_success(TICKER_PROVIDER))
            }
            Err(e) => Err(e),
        };

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_degradable() => {
                warn!(provider = TICKER_PROVIDER, error = %e, "Ticker unavailable, returning empty snapshot");
                return Ok(Snapshot::empty());
            }
            Err(e) => return Err(e),
        };

        let entries: Vec<TickerEntry> = response.json(TICKER_PROVIDER)?;
        let snapshot = entries
            .into_iter()
            .map(TickerEntry::into_record)
            .collect::<RatesResult<Snapshot>>()?;

        debug!(records = snapshot.len(), "Built crypto snapshot");

        Ok(snapshot)
    }
}
