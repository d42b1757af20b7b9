//! Fiat currency rates built from a currency directory and a daily rates archive.
//!
//! A snapshot merges five upstream calls: the code -> name directory, and the
//! rate tables for today, 1, 7 and 30 days ago. Each historical table is
//! optional; a missing one only costs that horizon.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use futures::future::join_all;
use ratewatch_common::{RateRecord, Reference, Snapshot};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::cache::TtlCache;
use crate::config::{api_key, UpstreamConfig};
use crate::error::{RatesError, RatesResult};
use crate::provider::SnapshotProvider;
use crate::transport::Transport;

const DIRECTORY_PROVIDER: &str = "getgeoapi";
const HISTORICAL_PROVIDER: &str = "currency-api";

/// Currency code -> display name.
pub type CurrencyDirectory = BTreeMap<String, String>;

/// Lowercase symbol -> rate relative to the reference.
type RateTable = HashMap<String, f64>;

/// Point in time a rate table is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePoint {
    Latest,
    OneDay,
    SevenDays,
    ThirtyDays,
}

impl TimePoint {
    pub const ALL: [TimePoint; 4] = [
        TimePoint::Latest,
        TimePoint::OneDay,
        TimePoint::SevenDays,
        TimePoint::ThirtyDays,
    ];

    /// Days before today.
    pub fn days_ago(&self) -> u64 {
        match self {
            TimePoint::Latest => 0,
            TimePoint::OneDay => 1,
            TimePoint::SevenDays => 7,
            TimePoint::ThirtyDays => 30,
        }
    }

    /// URL path segment: `latest` or the `YYYY-MM-DD` date.
    pub fn path_segment(&self, today: NaiveDate) -> String {
        if *self == TimePoint::Latest {
            return "latest".to_string();
        }

        today
            .checked_sub_days(Days::new(self.days_ago()))
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryResponse {
    currencies: CurrencyDirectory,
}

/// Rate tables for every [`TimePoint`] of one reference.
#[derive(Debug, Default)]
struct RateSeries {
    latest: RateTable,
    one_day: RateTable,
    seven_days: RateTable,
    thirty_days: RateTable,
}

impl RateSeries {
    fn from_tables(tables: Vec<RateTable>) -> Self {
        let mut tables = tables.into_iter();
        let mut next = || tables.next().unwrap_or_default();

        Self {
            latest: next(),
            one_day: next(),
            seven_days: next(),
            thirty_days: next(),
        }
    }
}

/// Reads the code -> name directory from the directory provider.
struct DirectorySource {
    transport: Arc<dyn Transport>,
    url: String,
    key_var: String,
}

impl DirectorySource {
    async fn fetch(&self) -> RatesResult<CurrencyDirectory> {
        let key = match api_key(&self.key_var) {
            Ok(key) => key,
            Err(e) => {
                warn!(provider = DIRECTORY_PROVIDER, error = %e, "Currency directory unavailable");
                return Ok(CurrencyDirectory::new());
            }
        };

        let url = format!("{}/v2/currency/list?api_key={}&format=json", self.url, key);

        let response = match self
            .transport
            .get(DIRECTORY_PROVIDER, &url)
            .await
            .and_then(|r| r.ensure_success(DIRECTORY_PROVIDER))
        {
            Ok(response) => response,
            Err(e) if e.is_degradable() => {
                warn!(provider = DIRECTORY_PROVIDER, error = %e, "Currency directory unavailable");
                return Ok(CurrencyDirectory::new());
            }
            Err(e) => return Err(e),
        };

        let directory: DirectoryResponse = response.json(DIRECTORY_PROVIDER)?;
        Ok(directory.currencies)
    }
}

/// Fiat upstream client.
pub struct FiatClient {
    transport: Arc<dyn Transport>,
    historical_url: String,
    directory_source: Arc<DirectorySource>,
    directory: TtlCache<(), CurrencyDirectory>,
}

impl FiatClient {
    /// Create a client. The directory cache lives as long as the client.
    pub fn new(config: &UpstreamConfig, transport: Arc<dyn Transport>) -> Self {
        let directory_source = DirectorySource {
            transport: transport.clone(),
            url: config.directory_url.trim_end_matches('/').to_string(),
            key_var: config.directory_key_var.clone(),
        };

        Self {
            transport,
            historical_url: config.historical_url.trim_end_matches('/').to_string(),
            directory_source: Arc::new(directory_source),
            directory: TtlCache::new("fiat-directory", config.directory_ttl),
        }
    }

    /// Build the snapshot as of `today`.
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn snapshot_on(&self, reference: Reference, today: NaiveDate) -> RatesResult<Snapshot> {
        let tables = join_all(
            TimePoint::ALL
                .iter()
                .map(|&point| self.fetch_rates(reference, point, today)),
        );
        let (directory, tables) = tokio::join!(self.directory(), tables);

        let tables = tables.into_iter().collect::<RatesResult<Vec<_>>>()?;
        let snapshot = merge(&directory, &RateSeries::from_tables(tables));

        debug!(
            directory = directory.len(),
            records = snapshot.len(),
            "Built fiat snapshot"
        );

        Ok(snapshot)
    }

    /// Currency directory, served from its own cache.
    pub async fn directory(&self) -> Arc<CurrencyDirectory> {
        let source = self.directory_source.clone();
        self.directory
            .get_or_fetch((), move || async move { source.fetch().await })
            .await
    }

    async fn fetch_rates(
        &self,
        reference: Reference,
        point: TimePoint,
        today: NaiveDate,
    ) -> RatesResult<RateTable> {
        let url = format!(
            "{}/{}/currencies/{}.json",
            self.historical_url,
            point.path_segment(today),
            reference.code()
        );

        let response = match self
            .transport
            .get(HISTORICAL_PROVIDER, &url)
            .await
            .and_then(|r| r.ensure_success(HISTORICAL_PROVIDER))
        {
            Ok(response) => response,
            Err(e) if e.is_degradable() => {
                warn!(
                    provider = HISTORICAL_PROVIDER,
                    time_point = ?point,
                    error = %e,
                    "Rate table unavailable, leaving time point empty"
                );
                return Ok(RateTable::new());
            }
            Err(e) => return Err(e),
        };

        let mut body: HashMap<String, serde_json::Value> = response.json(HISTORICAL_PROVIDER)?;
        let table = body.remove(reference.code()).ok_or_else(|| {
            RatesError::malformed(
                HISTORICAL_PROVIDER,
                format!("missing rate table for {}", reference.code()),
            )
        })?;

        let table: RateTable = serde_json::from_value(table)
            .map_err(|e| RatesError::malformed(HISTORICAL_PROVIDER, e))?;

        Ok(table
            .into_iter()
            .map(|(symbol, rate)| (symbol.to_lowercase(), rate))
            .collect())
    }
}

#[async_trait]
impl SnapshotProvider for FiatClient {
    fn name(&self) -> &'static str {
        "fiat"
    }

    async fn fetch_snapshot(&self, reference: Reference) -> RatesResult<Snapshot> {
        self.snapshot_on(reference, Utc::now().date_naive()).await
    }
}

/// Join the directory with the rate series. Only symbols quoted in `latest` are kept.
fn merge(directory: &CurrencyDirectory, series: &RateSeries) -> Snapshot {
    directory
        .iter()
        .filter_map(|(code, name)| {
            let key = code.to_lowercase();
            let rate = |table: &RateTable| table.get(&key).copied().and_then(to_decimal);

            let value = rate(&series.latest)?;
            Some(RateRecord::new(
                code.as_str(),
                name.clone(),
                value,
                rate(&series.one_day),
                rate(&series.seven_days),
                rate(&series.thirty_days),
            ))
        })
        .collect()
}

/// Rates that do not fit a `Decimal` (non-finite, or beyond about 7.9e28) are
/// treated as absent. For `latest` this drops the symbol from the snapshot.
fn to_decimal(rate: f64) -> Option<Decimal> {
    match Decimal::try_from(rate) {
        Ok(rate) => Some(rate),
        Err(e) => {
            warn!(provider = HISTORICAL_PROVIDER, rate, error = %e, "Discarding unrepresentable rate");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeTransport;
    use ratewatch_common::MISSING_RATE;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::time::Instant;

    const KEY_VAR: &str = "RATEWATCH_TEST_FIAT_DIRECTORY_KEY";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn config(key_var: &str) -> UpstreamConfig {
        UpstreamConfig {
            directory_url: "https://directory.test".to_string(),
            historical_url: "https://rates.test/".to_string(),
            directory_key_var: key_var.to_string(),
            ..Default::default()
        }
    }

    fn merge_fixture() -> FakeTransport {
        FakeTransport::new()
            .route(
                "/v2/currency/list",
                200,
                r#"{"status":"success","currencies":{"USD":"US Dollar","XYZ":"Unknown"}}"#,
            )
            .route("/latest/currencies/eur.json", 200, r#"{"date":"2026-10-18","eur":{"usd":1.0}}"#)
            .route("/2026-10-17/currencies/eur.json", 200, r#"{"date":"2026-10-17","eur":{"usd":0.98}}"#)
            .route("/2026-10-11/currencies/eur.json", 200, r#"{"date":"2026-10-11","eur":{}}"#)
            .route("/2026-09-18/currencies/eur.json", 200, r#"{"date":"2026-09-18","eur":{"usd":0.90}}"#)
    }

    #[test]
    fn test_time_point_path_segments() {
        assert_eq!(TimePoint::Latest.path_segment(today()), "latest");
        assert_eq!(TimePoint::OneDay.path_segment(today()), "2026-10-17");
        assert_eq!(TimePoint::SevenDays.path_segment(today()), "2026-10-11");
        assert_eq!(TimePoint::ThirtyDays.path_segment(today()), "2026-09-18");
    }

    #[tokio::test]
    async fn test_merge_excludes_symbols_missing_from_latest() {
        std::env::set_var(KEY_VAR, "key");
        let transport = Arc::new(merge_fixture());
        let client = FiatClient::new(&config(KEY_VAR), transport.clone());

        let snapshot = client.snapshot_on(Reference::Eur, today()).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("XYZ").is_none());

        let usd = snapshot.get("USD").unwrap();
        assert_eq!(usd.name, "US Dollar");
        assert_eq!(usd.value, dec!(1.0));
        assert_eq!(usd.value_1d, dec!(0.98));
        assert_eq!(usd.value_7d, MISSING_RATE);
        assert_eq!(usd.value_30d, dec!(0.90));

        assert_eq!(transport.requests().len(), 5);
        assert!(transport
            .requests()
            .iter()
            .any(|u| u == "https://directory.test/v2/currency/list?api_key=key&format=json"));
    }

    #[test]
    fn test_unrepresentable_rates_are_absent() {
        assert!(to_decimal(0.9412).is_some());
        assert_eq!(to_decimal(f64::NAN), None);
        assert_eq!(to_decimal(f64::INFINITY), None);
        assert_eq!(to_decimal(1e30), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_calls_run_concurrently() {
        let key_var = "RATEWATCH_TEST_FIAT_CONCURRENT_KEY";
        std::env::set_var(key_var, "key");
        let latency = Duration::from_millis(100);
        let transport = Arc::new(merge_fixture().with_latency(latency));
        let client = FiatClient::new(&config(key_var), transport.clone());

        let started = Instant::now();
        let snapshot = client.snapshot_on(Reference::Eur, today()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(transport.requests().len(), 5);
        assert!(elapsed >= latency);
        assert!(elapsed < latency * 2, "sub-fetches ran sequentially: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_failed_time_point_only_loses_that_horizon() {
        let key_var = "RATEWATCH_TEST_FIAT_PARTIAL_KEY";
        std::env::set_var(key_var, "key");
        let transport = FakeTransport::new()
            .route("/v2/currency/list", 200, r#"{"currencies":{"CHF":"Swiss Franc","USD":"US Dollar"}}"#)
            .route("/latest/", 200, r#"{"usd":{"chf":0.8812345,"eur":0.92}}"#)
            .route("/2026-10-17/", 503, "")
            .route("/2026-10-11/", 0, "")
            .route("/2026-09-18/", 200, r#"{"usd":{"chf":0.87}}"#);
        let client = FiatClient::new(&config(key_var), Arc::new(transport));

        let snapshot = client.snapshot_on(Reference::Usd, today()).await.unwrap();

        let symbols: Vec<&str> = snapshot.symbols().map(|s| s.code()).collect();
        assert_eq!(symbols, vec!["CHF"]);

        let chf = snapshot.get("chf").unwrap();
        assert_eq!(chf.value, dec!(0.8812));
        assert_eq!(chf.value_1d, MISSING_RATE);
        assert_eq!(chf.value_7d, MISSING_RATE);
        assert_eq!(chf.value_30d, dec!(0.87));
    }

    #[tokio::test]
    async fn test_missing_directory_key_yields_empty_snapshot() {
        let transport = Arc::new(merge_fixture());
        let client = FiatClient::new(&config("RATEWATCH_TEST_FIAT_UNSET_KEY"), transport.clone());

        let snapshot = client.snapshot_on(Reference::Eur, today()).await.unwrap();

        assert!(snapshot.is_empty());
        assert_eq!(transport.request_count("/v2/currency/list"), 0);
    }

    #[tokio::test]
    async fn test_directory_is_cached_across_snapshots() {
        let key_var = "RATEWATCH_TEST_FIAT_CACHED_KEY";
        std::env::set_var(key_var, "key");
        let transport = Arc::new(merge_fixture());
        let client = FiatClient::new(&config(key_var), transport.clone());

        client.snapshot_on(Reference::Eur, today()).await.unwrap();
        client.snapshot_on(Reference::Eur, today()).await.unwrap();

        assert_eq!(transport.request_count("/v2/currency/list"), 1);
        assert_eq!(transport.request_count("/latest/"), 2);
    }

    #[tokio::test]
    async fn test_malformed_rate_table_fails_fetch() {
        let key_var = "RATEWATCH_TEST_FIAT_MALFORMED_KEY";
        std::env::set_var(key_var, "key");
        let transport = FakeTransport::new()
            .route("/v2/currency/list", 200, r#"{"currencies":{"USD":"US Dollar"}}"#)
            .route("/currencies/eur.json", 200, r#"{"date":"2026-10-18"}"#);
        let client = FiatClient::new(&config(key_var), Arc::new(transport));

        let err = client.snapshot_on(Reference::Eur, today()).await.unwrap_err();

        assert!(matches!(err, RatesError::MalformedResponse { provider: HISTORICAL_PROVIDER, .. }));
    }
}
