//! Upstream provider configuration.

use std::time::Duration;

use crate::error::{RatesError, RatesResult};

/// Configuration for the upstream clients and their caches.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the currency directory provider.
    pub directory_url: String,
    /// Base URL of the historical fiat rates provider.
    pub historical_url: String,
    /// Base URL of the crypto ticker provider.
    pub ticker_url: String,
    /// Environment variable holding the directory API key.
    pub directory_key_var: String,
    /// Environment variable holding the ticker API key.
    pub ticker_key_var: String,
    /// Number of assets requested from the ticker.
    pub ticker_limit: u32,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Lifetime of a fiat snapshot.
    pub fiat_ttl: Duration,
    /// Lifetime of a crypto snapshot.
    pub crypto_ttl: Duration,
    /// Lifetime of the currency directory.
    pub directory_ttl: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            directory_url: "https://api.getgeoapi.com".to_string(),
            historical_url: "https://cdn.jsdelivr.net/gh/fawazahmed0/currency-api@1".to_string(),
            ticker_url: "https://api.nomics.com".to_string(),
            directory_key_var: "APIKEY_GETGEOAPI".to_string(),
            ticker_key_var: "APIKEY_NOMICS".to_string(),
            ticker_limit: 100,
            request_timeout: Duration::from_secs(30),
            fiat_ttl: Duration::from_secs(3600),
            // Ticker provider is rate limited far tighter than the fiat sources.
            crypto_ttl: Duration::from_secs(21600),
            directory_ttl: Duration::from_secs(3600),
        }
    }
}

impl UpstreamConfig {
    /// Load configuration from environment variables.
    ///
    /// API key values are not read here; clients look them up at call time.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("RATEWATCH_DIRECTORY_URL") {
            config.directory_url = url;
        }

        if let Ok(url) = std::env::var("RATEWATCH_HISTORICAL_URL") {
            config.historical_url = url;
        }

        if let Ok(url) = std::env::var("RATEWATCH_TICKER_URL") {
            config.ticker_url = url;
        }

        if let Some(secs) = env_secs("RATEWATCH_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = secs;
        }

        if let Some(secs) = env_secs("RATEWATCH_FIAT_TTL_SECS") {
            config.fiat_ttl = secs;
        }

        if let Some(secs) = env_secs("RATEWATCH_CRYPTO_TTL_SECS") {
            config.crypto_ttl = secs;
        }

        if let Some(secs) = env_secs("RATEWATCH_DIRECTORY_TTL_SECS") {
            config.directory_ttl = secs;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [
            ("directory", &self.directory_url),
            ("historical", &self.historical_url),
            ("ticker", &self.ticker_url),
        ] {
            if url.is_empty() {
                return Err(format!("{} URL cannot be empty", name));
            }
        }

        if self.fiat_ttl.is_zero() || self.crypto_ttl.is_zero() || self.directory_ttl.is_zero() {
            return Err("Cache TTL cannot be zero".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        if self.ticker_limit == 0 {
            return Err("Ticker limit cannot be zero".to_string());
        }

        Ok(())
    }
}

/// Read an API key from the environment at call time.
pub fn api_key(var: &str) -> RatesResult<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(RatesError::ConfigurationMissing(var.to_string())),
    }
}

fn env_secs(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
