//! Currency rates services.

use std::sync::Arc;

use async_trait::async_trait;
use ratewatch_common::{normalize_symbol, RateRecord, Reference, Snapshot};
use tracing::{debug, instrument};

use crate::cache::{CacheStats, SharedSnapshotCache, SnapshotCache};
use crate::config::UpstreamConfig;
use crate::crypto::CryptoClient;
use crate::fiat::FiatClient;
use crate::provider::SnapshotProvider;
use crate::transport::Transport;

/// Read access to the current rates of one provider.
#[async_trait]
pub trait CurrencyRatesService: Send + Sync {
    /// Rate for one symbol, or `None` if the current snapshot does not list it.
    async fn get(&self, symbol: &str, reference: Reference) -> Option<RateRecord>;

    /// The full snapshot for `reference`, possibly empty.
    async fn get_all(&self, reference: Reference) -> Arc<Snapshot>;

    /// Statistics of the backing snapshot cache.
    async fn cache_stats(&self) -> CacheStats;
}

/// Serves snapshots from a provider through a snapshot cache.
pub struct RatesService<P> {
    provider: Arc<P>,
    cache: SharedSnapshotCache,
}

/// Fiat rates service.
pub type FiatRatesService = RatesService<FiatClient>;

/// Crypto rates service.
pub type CryptoRatesService = RatesService<CryptoClient>;

impl<P: SnapshotProvider + 'static> RatesService<P> {
    /// Create a service over `provider`, caching snapshots in `cache`.
    pub fn new(provider: P, cache: SharedSnapshotCache) -> Self {
        Self {
            provider: Arc::new(provider),
            cache,
        }
    }
}

impl RatesService<FiatClient> {
    /// Fiat service with its snapshot cache sized from `config`.
    pub fn fiat(config: &UpstreamConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            FiatClient::new(config, transport),
            Arc::new(SnapshotCache::new("fiat", config.fiat_ttl)),
        )
    }
}

impl RatesService<CryptoClient> {
    /// Crypto service with its snapshot cache sized from `config`.
    pub fn crypto(config: &UpstreamConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            CryptoClient::new(config, transport),
            Arc::new(SnapshotCache::new("crypto", config.crypto_ttl)),
        )
    }
}

#[async_trait]
impl<P: SnapshotProvider + 'static> CurrencyRatesService for RatesService<P> {
    #[instrument(skip(self))]
    async fn get(&self, symbol: &str, reference: Reference) -> Option<RateRecord> {
        let symbol = normalize_symbol(symbol);
        let snapshot = self.get_all(reference).await;
        let record = snapshot.get(&symbol).cloned();

        if record.is_none() {
            debug!(provider = self.provider.name(), symbol = %symbol, "Symbol not in snapshot");
        }

        record
    }

    async fn get_all(&self, reference: Reference) -> Arc<Snapshot> {
        let provider = self.provider.clone();
        self.cache
            .get_or_fetch(reference, move || async move {
                provider.fetch_snapshot(reference).await
            })
            .await
    }

    async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
