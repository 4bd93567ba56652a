use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar of a fixed timeframe, as received from the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered candles for one symbol/timeframe, oldest first.
pub type CandleSeries = Vec<Candle>;

impl Candle {
    /// Build a candle from an exchange open-time in epoch milliseconds.
    pub fn from_millis(
        open_time_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self> {
        let timestamp = DateTime::from_timestamp_millis(open_time_ms)
            .with_context(|| format!("candle timestamp {open_time_ms} is out of range"))?;
        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Open time in epoch milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Composite key naming one candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandleKey {
    pub symbol: String,
    pub interval: String,
}

impl std::fmt::Display for CandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
