// =============================================================================
// TWAP Calculator - windowed mean of typical prices
// =============================================================================
//
// The window is measured in calendar days back from today's UTC date. It is
// labelled "business days" on the dashboard, but weekends and holidays are
// not skipped.
//
// Every candle in the window contributes equally. Neither volume nor candle
// duration weights the mean.
// =============================================================================

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::market_data::{Candle, CandleSeries};

/// TWAP for one symbol together with the candles it was computed from.
#[derive(Debug, Clone, Serialize)]
pub struct TwapResult {
    pub symbol: String,
    pub twap: f64,
    pub series: CandleSeries,
}

/// One point of the typical-price line chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub typical_price: f64,
}

impl TwapResult {
    /// Typical price per candle, in series order.
    pub fn typical_prices(&self) -> Vec<PricePoint> {
        self.series
            .iter()
            .map(|c| PricePoint {
                timestamp: c.timestamp,
                typical_price: c.typical_price(),
            })
            .collect()
    }
}

/// First calendar date inside a `window_days` window ending `today`.
pub fn window_cutoff(today: NaiveDate, window_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Keep only candles whose UTC date is on or after `cutoff`.
pub fn filter_window(series: CandleSeries, cutoff: NaiveDate) -> CandleSeries {
    series
        .into_iter()
        .filter(|c| c.timestamp.date_naive() >= cutoff)
        .collect()
}

/// Arithmetic mean of typical prices, `None` for an empty slice.
pub fn typical_price_mean(candles: &[Candle]) -> Option<f64> {
    if candles.is_empty() {
        return None;
    }
    let sum: f64 = candles.iter().map(Candle::typical_price).sum();
    Some(sum / candles.len() as f64)
}

/// Reduce a fetched series to its TWAP over the trailing `window_days`.
///
/// Returns `None` when no candle falls inside the window. That is the
/// dashboard's "no data" outcome, not a failure.
pub fn compute_from_series(
    symbol: &str,
    series: CandleSeries,
    window_days: u32,
    today: NaiveDate,
) -> Option<TwapResult> {
    let filtered = filter_window(series, window_cutoff(today, window_days));
    let twap = typical_price_mean(&filtered)?;
    Some(TwapResult {
        symbol: symbol.to_string(),
        twap,
        series: filtered,
    })
}
