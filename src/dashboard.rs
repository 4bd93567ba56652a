// =============================================================================
// Dashboard Report - per-symbol TWAP panels plus the summary table
// =============================================================================
//
// Symbols are processed one after another; each run is independent. A symbol
// whose fetch fails gets a `failed` panel and the remaining symbols still run.
// "No data" and "failed" are separate panel kinds so the dashboard can show a
// warning for the former and an error for the latter.
// =============================================================================

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::market_data::CandleSource;
use crate::twap::{self, FetchLimits, PricePoint, TwapRequest, TwapResult};
use crate::types::Timeframe;

/// Validated multi-symbol request.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    pub lookback_days: u32,
}

impl ReportRequest {
    /// Trim and de-duplicate `symbols` (first occurrence wins) and check the
    /// day count against `1..=max_days`.
    pub fn new(
        symbols: Vec<String>,
        timeframe: Timeframe,
        lookback_days: u32,
        max_days: u32,
    ) -> Result<Self> {
        let mut unique: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol = symbol.trim().to_string();
            if !symbol.is_empty() && !unique.contains(&symbol) {
                unique.push(symbol);
            }
        }
        ensure!(!unique.is_empty(), "select at least one symbol");
        ensure!(
            (1..=max_days).contains(&lookback_days),
            "days must be between 1 and {max_days}, got {lookback_days}"
        );

        Ok(Self {
            symbols: unique,
            timeframe,
            lookback_days,
        })
    }
}

/// Row of the summary table.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub symbol: String,
    pub twap: f64,
}

/// What the dashboard renders for one symbol.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolPanel {
    Ok {
        symbol: String,
        twap: f64,
        candles: usize,
        points: Vec<PricePoint>,
    },
    NoData {
        symbol: String,
        message: String,
    },
    Failed {
        symbol: String,
        error: String,
    },
}

impl SymbolPanel {
    pub fn from_result(symbol: &str, result: Result<Option<TwapResult>>) -> Self {
        match result {
            Ok(Some(r)) => Self::Ok {
                symbol: r.symbol.clone(),
                twap: r.twap,
                candles: r.series.len(),
                points: r.typical_prices(),
            },
            Ok(None) => Self::NoData {
                symbol: symbol.to_string(),
                message: format!(
                    "No data retrieved for {symbol}. Please check the pair or date range."
                ),
            },
            Err(e) => Self::Failed {
                symbol: symbol.to_string(),
                error: format!("{e:#}"),
            },
        }
    }

    pub fn summary_row(&self) -> Option<SummaryRow> {
        match self {
            Self::Ok { symbol, twap, .. } => Some(SummaryRow {
                symbol: symbol.clone(),
                twap: *twap,
            }),
            _ => None,
        }
    }
}

/// Everything one "Fetch TWAP Data" click produces.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub lookback_days: u32,
    pub summary: Vec<SummaryRow>,
    pub panels: Vec<SymbolPanel>,
}

pub async fn build_report(
    source: &dyn CandleSource,
    request: &ReportRequest,
    limits: FetchLimits,
) -> DashboardReport {
    build_report_at(source, request, limits, Utc::now()).await
}

pub async fn build_report_at(
    source: &dyn CandleSource,
    request: &ReportRequest,
    limits: FetchLimits,
    now: DateTime<Utc>,
) -> DashboardReport {
    let report_id = Uuid::new_v4();
    info!(
        report_id = %report_id,
        symbols = ?request.symbols,
        timeframe = %request.timeframe,
        days = request.lookback_days,
        "building TWAP report"
    );

    let mut panels = Vec::with_capacity(request.symbols.len());
    for symbol in &request.symbols {
        let result = match TwapRequest::new(symbol.as_str(), request.timeframe, request.lookback_days) {
            Ok(req) => twap::compute_twap_at(source, &req, limits, now).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(symbol = %symbol, error = %format!("{e:#}"), "TWAP fetch failed");
        }
        panels.push(SymbolPanel::from_result(symbol, result));
    }

    let summary = panels.iter().filter_map(SymbolPanel::summary_row).collect();

    DashboardReport {
        report_id,
        generated_at: now,
        timeframe: request.timeframe,
        lookback_days: request.lookback_days,
        summary,
        panels,
    }
}
