//! HTTP routes.
//!
//! - `GET /fiat/{reference}` and `GET /crypto/{reference}`: every rate.
//! - `GET /fiat/{reference}/{symbol}` and `GET /crypto/{reference}/{symbol}`:
//!   one rate, `null` when the symbol is unknown.
//! - `GET /health`: cache statistics for both providers.
//! - `GET /openapi.json`: OpenAPI document for the routes above.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use ratewatch_common::{RateRecord, Reference, Snapshot};
use ratewatch_rates::CacheStats;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::error::ApiResult;
use crate::state::{AppState, SharedRates};

#[derive(OpenApi)]
#[openapi(
    paths(fiat_rates, fiat_rate, crypto_rates, crypto_rate, health),
    tags(
        (name = "Fiat", description = "Fiat currency rates"),
        (name = "Crypto", description = "Crypto currency rates"),
        (name = "Health")
    )
)]
pub struct ApiDoc;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/fiat/{reference}", get(fiat_rates))
        .route("/fiat/{reference}/{symbol}", get(fiat_rate))
        .route("/crypto/{reference}", get(crypto_rates))
        .route("/crypto/{reference}/{symbol}", get(crypto_rate))
        .route("/health", get(health))
        .route("/openapi.json", get(|| async { Json(openapi) }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Get all rates
///
/// Returns all available rates for the specified reference.
#[utoipa::path(
    get,
    path = "/fiat/{reference}",
    tag = "Fiat",
    params(("reference" = String, Path, description = "Reference currency: eur or usd")),
    responses(
        (status = 200, description = "Rates keyed by symbol"),
        (status = 400, description = "Unsupported reference currency")
    )
)]
async fn fiat_rates(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<Json<Arc<Snapshot>>> {
    all_rates(&state.fiat, &reference).await
}

/// Get single rate
///
/// Returns the rate for the specified currency/reference pair.
#[utoipa::path(
    get,
    path = "/fiat/{reference}/{symbol}",
    tag = "Fiat",
    params(
        ("reference" = String, Path, description = "Reference currency: eur or usd"),
        ("symbol" = String, Path, description = "Currency symbol, any case")
    ),
    responses(
        (status = 200, description = "The rate, or null for an unknown symbol"),
        (status = 400, description = "Unsupported reference currency")
    )
)]
async fn fiat_rate(
    State(state): State<AppState>,
    Path((reference, symbol)): Path<(String, String)>,
) -> ApiResult<Json<Option<RateRecord>>> {
    one_rate(&state.fiat, &reference, &symbol).await
}

/// Get all rates
///
/// Returns all available rates for the specified reference.
#[utoipa::path(
    get,
    path = "/crypto/{reference}",
    tag = "Crypto",
    params(("reference" = String, Path, description = "Reference currency: eur or usd")),
    responses(
        (status = 200, description = "Rates keyed by symbol"),
        (status = 400, description = "Unsupported reference currency")
    )
)]
async fn crypto_rates(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<Json<Arc<Snapshot>>> {
    all_rates(&state.crypto, &reference).await
}

/// Get single rate
///
/// Returns the rate for the specified currency/reference pair.
#[utoipa::path(
    get,
    path = "/crypto/{reference}/{symbol}",
    tag = "Crypto",
    params(
        ("reference" = String, Path, description = "Reference currency: eur or usd"),
        ("symbol" = String, Path, description = "Currency symbol, any case")
    ),
    responses(
        (status = 200, description = "The rate, or null for an unknown symbol"),
        (status = 400, description = "Unsupported reference currency")
    )
)]
async fn crypto_rate(
    State(state): State<AppState>,
    Path((reference, symbol)): Path<(String, String)>,
) -> ApiResult<Json<Option<RateRecord>>> {
    one_rate(&state.crypto, &reference, &symbol).await
}

async fn all_rates(rates: &SharedRates, reference: &str) -> ApiResult<Json<Arc<Snapshot>>> {
    let reference: Reference = reference.parse()?;
    Ok(Json(rates.get_all(reference).await))
}

async fn one_rate(
    rates: &SharedRates,
    reference: &str,
    symbol: &str,
) -> ApiResult<Json<Option<RateRecord>>> {
    let reference: Reference = reference.parse()?;
    Ok(Json(rates.get(symbol, reference).await))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    fiat: CacheStats,
    crypto: CacheStats,
}

/// Cache statistics for both providers.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is up"))
)]
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        fiat: state.fiat.cache_stats().await,
        crypto: state.crypto.cache_stats().await,
    })
}
