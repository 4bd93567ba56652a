// =============================================================================
// REST API Endpoints - Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/` and are consumed by the dashboard
// frontend. There is no authentication; the service only reads public market
// data.
//
// CORS is configured permissively so the frontend can be served from any
// origin during development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::app_state::AppState;
use crate::dashboard::{self, ReportRequest, SymbolPanel};
use crate::twap::{self, TwapRequest};
use crate::types::Timeframe;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/options", get(options))
        .route("/api/v1/twap", get(single_twap))
        .route("/api/v1/report", post(report))
        .layer(cors)
        .with_state(state)
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    uptime_secs: u64,
    exchange: &'static str,
    requests_sent: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.uptime_secs(),
        exchange: state.source.name(),
        requests_sent: state.source.requests_sent(),
    })
}

// =============================================================================
// Selection options
// =============================================================================

#[derive(Serialize)]
struct OptionsResponse {
    symbols: Vec<String>,
    default_symbols: Vec<String>,
    timeframes: Vec<Timeframe>,
    default_timeframe: Timeframe,
    min_days: u32,
    max_days: u32,
    default_days: u32,
}

async fn options(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = &state.config;
    Json(OptionsResponse {
        symbols: config.symbols.clone(),
        default_symbols: config.default_symbols.clone(),
        timeframes: Timeframe::ALL.to_vec(),
        default_timeframe: config.default_timeframe,
        min_days: 1,
        max_days: config.max_lookback_days,
        default_days: config.default_lookback_days,
    })
}

// =============================================================================
// Single symbol TWAP
// =============================================================================

#[derive(Deserialize)]
struct TwapQuery {
    symbol: String,
    #[serde(default)]
    timeframe: Option<String>,
    #[serde(default)]
    days: Option<u32>,
}

async fn single_twap(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TwapQuery>,
) -> Response {
    let config = &state.config;

    let timeframe = match query.timeframe.as_deref() {
        Some(raw) => match raw.parse::<Timeframe>() {
            Ok(tf) => tf,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => config.default_timeframe,
    };

    let days = query.days.unwrap_or(config.default_lookback_days);
    if days > config.max_lookback_days {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("days must be between 1 and {}, got {days}", config.max_lookback_days),
        );
    }

    let request = match TwapRequest::new(query.symbol, timeframe, days) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match twap::compute_twap(state.source.as_ref(), &request, state.fetch_limits()).await {
        Ok(result) => Json(SymbolPanel::from_result(&request.symbol, Ok(result))).into_response(),
        Err(e) => {
            let message = format!("{e:#}");
            warn!(symbol = %request.symbol, error = %message, "upstream fetch failed");
            error_response(StatusCode::BAD_GATEWAY, message)
        }
    }
}

// =============================================================================
// Multi-symbol report
// =============================================================================

#[derive(Deserialize)]
struct ReportBody {
    #[serde(default)]
    symbols: Option<Vec<String>>,
    #[serde(default)]
    timeframe: Option<Timeframe>,
    #[serde(default)]
    days: Option<u32>,
}

async fn report(State(state): State<Arc<AppState>>, Json(body): Json<ReportBody>) -> Response {
    let config = &state.config;

    let request = match ReportRequest::new(
        body.symbols.unwrap_or_else(|| config.default_symbols.clone()),
        body.timeframe.unwrap_or(config.default_timeframe),
        body.days.unwrap_or(config.default_lookback_days),
        config.max_lookback_days,
    ) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let report = dashboard::build_report(state.source.as_ref(), &request, state.fetch_limits()).await;
    Json(report).into_response()
}

// =============================================================================
// Tests
// =============================================================================
