//! Shared application state.

use std::sync::Arc;

use ratewatch_rates::{
    CryptoRatesService, CurrencyRatesService, FiatRatesService, HttpTransport, Transport,
    UpstreamConfig,
};

/// Rates service shared across requests.
pub type SharedRates = Arc<dyn CurrencyRatesService>;

/// Services handed to every request. Both caches live here and are dropped
/// with the state on shutdown.
#[derive(Clone)]
pub struct AppState {
    pub fiat: SharedRates,
    pub crypto: SharedRates,
}

impl AppState {
    pub fn new(fiat: SharedRates, crypto: SharedRates) -> Self {
        Self { fiat, crypto }
    }

    /// Build both services over one HTTP client.
    pub fn from_config(config: &UpstreamConfig) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.request_timeout));

        Self::new(
            Arc::new(FiatRatesService::fiat(config, transport.clone())),
            Arc::new(CryptoRatesService::crypto(config, transport)),
        )
    }
}
