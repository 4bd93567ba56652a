pub mod calculator;
pub mod fetcher;

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::market_data::CandleSource;
use crate::types::Timeframe;

pub use calculator::{PricePoint, TwapResult};
pub use fetcher::FetchLimits;

/// Validated input for one fetch-and-compute run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwapRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Days fetched back from now; also the width of the averaging window.
    pub lookback_days: u32,
}

impl TwapRequest {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, lookback_days: u32) -> Result<Self> {
        let symbol = symbol.into().trim().to_string();
        ensure!(!symbol.is_empty(), "symbol must not be empty");
        ensure!(lookback_days >= 1, "lookback_days must be at least 1, got {lookback_days}");
        Ok(Self {
            symbol,
            timeframe,
            lookback_days,
        })
    }
}

/// Fetch candles for `request` and reduce them to a TWAP.
///
/// `Ok(None)` means no candle fell inside the window. Upstream failures are
/// returned as `Err`.
pub async fn compute_twap(
    source: &dyn CandleSource,
    request: &TwapRequest,
    limits: FetchLimits,
) -> Result<Option<TwapResult>> {
    compute_twap_at(source, request, limits, Utc::now()).await
}

/// [`compute_twap`] with an explicit clock.
#[instrument(skip(source, request, limits), fields(symbol = %request.symbol, days = request.lookback_days, timeframe = %request.timeframe))]
pub async fn compute_twap_at(
    source: &dyn CandleSource,
    request: &TwapRequest,
    limits: FetchLimits,
    now: DateTime<Utc>,
) -> Result<Option<TwapResult>> {
    let series = fetcher::fetch_candle_series(
        source,
        &request.symbol,
        request.timeframe,
        request.lookback_days,
        now,
        limits,
    )
    .await?;
    let fetched = series.len();

    let result = calculator::compute_from_series(
        &request.symbol,
        series,
        request.lookback_days,
        now.date_naive(),
    );

    match &result {
        Some(r) => info!(fetched, in_window = r.series.len(), twap = r.twap, "TWAP computed"),
        None => info!(fetched, "no candles inside the window"),
    }
    Ok(result)
}
