//! Ratewatch Server
//!
//! HTTP facade over the fiat and crypto rates services. Each provider is
//! served under its own path prefix; upstream failures surface as empty
//! results, never as server errors.

pub mod api;
pub mod config;
pub mod error;
pub mod state;

pub use api::router;
pub use config::ServerConfig;
pub use state::AppState;
