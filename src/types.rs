// =============================================================================
// Shared types used across the TWAP dashboard
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Candle width supported by the dashboard's timeframe selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    /// Every selectable timeframe, narrowest first.
    pub const ALL: [Timeframe; 5] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::OneHour,
        Self::OneDay,
    ];

    /// Width of one candle in milliseconds.
    pub fn millis(self) -> i64 {
        match self {
            Self::OneMinute => 60_000,
            Self::FiveMinutes => 5 * 60_000,
            Self::FifteenMinutes => 15 * 60_000,
            Self::OneHour => 60 * 60_000,
            Self::OneDay => 24 * 60 * 60_000,
        }
    }

    /// Short label used by the dashboard and in query strings.
    pub fn label(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
        }
    }

    /// Interval code understood by MEXC `/api/v3/klines`.
    ///
    /// MEXC spells the hourly interval `60m` rather than `1h`.
    pub fn mexc_interval(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "60m",
            Self::OneDay => "1d",
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::OneMinute
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.label() == s.trim())
            .ok_or_else(|| {
                anyhow::anyhow!("unsupported timeframe '{s}' (expected one of 1m, 5m, 15m, 1h, 1d)")
            })
    }
}
