// =============================================================================
// MEXC REST API Client - public spot market data
// =============================================================================
//
// Only the unauthenticated `/api/v3/klines` endpoint is used. No API key is
// sent and nothing is signed. Requests go through a `RequestPacer` so that
// paginating a long lookback never bursts past the exchange's IP limit.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::exchange::pacer::RequestPacer;
use crate::market_data::{Candle, CandleSource};
use crate::types::Timeframe;

/// Production MEXC endpoint.
pub const MEXC_BASE_URL: &str = "https://api.mexc.com";

/// Largest `limit` accepted by `/api/v3/klines`.
pub const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// MEXC public REST client. The reqwest pool and pacer are per instance, so
/// build one at startup and share it behind an `Arc`.
pub struct MexcClient {
    base_url: String,
    client: reqwest::Client,
    pacer: RequestPacer,
}

impl MexcClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `MexcClient`.
    ///
    /// # Arguments
    /// * `base_url`     - e.g. [`MEXC_BASE_URL`]; a trailing `/` is ignored.
    /// * `timeout`      - per-request timeout enforced by reqwest.
    /// * `min_interval` - minimum spacing between consecutive requests.
    pub fn new(base_url: impl Into<String>, timeout: Duration, min_interval: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "MexcClient initialised");

        Ok(Self {
            base_url,
            client,
            pacer: RequestPacer::new(min_interval),
        })
    }

    /// Full klines URL for one page request.
    fn klines_url(&self, symbol: &str, timeframe: Timeframe, since_ms: i64, limit: u32) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={}&startTime={}&limit={}",
            self.base_url,
            normalize_symbol(symbol),
            timeframe.mexc_interval(),
            since_ms,
            limit.clamp(1, MAX_KLINES_PER_REQUEST)
        )
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines (public).
    ///
    /// Returns candles with open time `>= since_ms`, oldest first.
    #[instrument(skip(self), name = "mexc::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since_ms: i64,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let url = self.klines_url(symbol, timeframe, since_ms, limit);

        self.pacer.wait_turn().await;

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("failed to read klines response body")?;

        if !status.is_success() {
            anyhow::bail!("MEXC GET /api/v3/klines returned {}: {}", status, text);
        }

        let body: serde_json::Value =
            serde_json::from_str(&text).context("failed to parse klines response")?;

        let candles = parse_klines(&body)?;
        debug!(symbol, %timeframe, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

#[async_trait]
impl CandleSource for MexcClient {
    fn name(&self) -> &'static str {
        "mexc"
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since_ms: i64,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        self.get_klines(symbol, timeframe, since_ms, limit).await
    }

    fn requests_sent(&self) -> u64 {
        self.pacer.requests_sent()
    }
}

impl std::fmt::Debug for MexcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MexcClient")
            .field("base_url", &self.base_url)
            .field("pacer", &self.pacer)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

/// Turn a unified symbol (`FARTBOY/USDT`) into MEXC's form (`FARTBOYUSDT`).
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_'))
        .collect::<String>()
        .to_uppercase()
}

/// Parse MEXC's array-of-arrays kline payload.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, [7] quoteAssetVolume
fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 6 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline openTime is not an integer")?;
        candles.push(Candle::from_millis(
            open_time,
            parse_str_f64(&arr[1])?,
            parse_str_f64(&arr[2])?,
            parse_str_f64(&arr[3])?,
            parse_str_f64(&arr[4])?,
            parse_str_f64(&arr[5])?,
        )?);
    }
    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}
