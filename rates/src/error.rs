//! Rate service error types.

use thiserror::Error;

/// Errors that can occur while fetching upstream rates.
#[derive(Debug, Error)]
pub enum RatesError {
    /// Provider answered with a non-success status or could not be reached.
    #[error("Upstream {provider} unavailable: {message}")]
    UpstreamUnavailable {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Required API key is not set in the environment.
    #[error("Missing API key: environment variable {0} is not set")]
    ConfigurationMissing(String),

    /// Provider answered with a payload that could not be decoded.
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse {
        provider: &'static str,
        message: String,
    },
}

impl RatesError {
    /// Whether the failure degrades to empty data instead of failing the fetch.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            RatesError::UpstreamUnavailable { .. } | RatesError::ConfigurationMissing(_)
        )
    }

    /// Stable error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            RatesError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            RatesError::ConfigurationMissing(_) => "CONFIGURATION_MISSING",
            RatesError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
        }
    }

    pub(crate) fn malformed(provider: &'static str, err: impl std::fmt::Display) -> Self {
        RatesError::MalformedResponse {
            provider,
            message: err.to_string(),
        }
    }
}

/// Result type for rate operations.
pub type RatesResult<T> = Result<T, RatesError>;
