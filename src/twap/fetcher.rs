// =============================================================================
// Market Data Fetcher - paginated OHLCV download
// =============================================================================
//
// Pages forward from `now - lookback_days` until the upstream runs dry or the
// last candle passes `now`. After every page the cursor moves to one
// millisecond past the newest candle kept, so it strictly increases and no
// candle can be fetched twice.
//
// Candles at or before the cursor are dropped on arrival, and a page that adds
// nothing new ends the loop. Running into `max_pages` is an error: a series cut
// short at the cap would average only the oldest part of the window.
// =============================================================================

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument, warn};

use crate::market_data::{CandleKey, CandleSeries, CandleSource};
use crate::types::Timeframe;

/// Page size and loop bound for one fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// Candles requested per page.
    pub page_limit: u32,
    /// Hard cap on page requests for one series.
    pub max_pages: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            page_limit: 1000,
            max_pages: 10_000,
        }
    }
}

/// Download every candle for `symbol` between `now - lookback_days` and `now`.
///
/// Returns an empty series when the upstream has nothing. Any upstream error,
/// an out-of-range lookback, or hitting the page cap aborts the whole
/// download; no partial series is returned.
#[instrument(skip(source, now, limits), fields(source = source.name()))]
pub async fn fetch_candle_series(
    source: &dyn CandleSource,
    symbol: &str,
    timeframe: Timeframe,
    lookback_days: u32,
    now: DateTime<Utc>,
    limits: FetchLimits,
) -> Result<CandleSeries> {
    let key = CandleKey {
        symbol: symbol.to_string(),
        interval: timeframe.label().to_string(),
    };
    let now_ms = now.timestamp_millis();
    let mut cursor = now
        .checked_sub_signed(Duration::days(i64::from(lookback_days)))
        .with_context(|| format!("{lookback_days} day lookback from {now} is out of range"))?
        .timestamp_millis();

    let span_candles = (now_ms - cursor) / timeframe.millis();
    debug!(
        key = %key,
        span_candles,
        expected_pages = span_candles / i64::from(limits.page_limit.max(1)) + 1,
        "starting paginated fetch"
    );

    let mut series = CandleSeries::new();
    let mut pages = 0usize;

    loop {
        if pages >= limits.max_pages {
            bail!(
                "{key} fetch hit the {} page cap at cursor {cursor} before catching up to now",
                limits.max_pages
            );
        }

        let page = source
            .fetch_ohlcv(symbol, timeframe, cursor, limits.page_limit)
            .await
            .with_context(|| format!("failed to fetch {key} candles since {cursor}"))?;
        pages += 1;

        if page.is_empty() {
            debug!(key = %key, pages, "upstream exhausted");
            break;
        }

        let received = page.len();
        let mut next_cursor = cursor;
        let mut last_ts = None;
        let mut kept = 0usize;
        for candle in page {
            let ts = candle.timestamp_ms();
            if ts < next_cursor {
                continue;
            }
            next_cursor = ts + 1;
            last_ts = Some(ts);
            series.push(candle);
            kept += 1;
        }

        if kept < received {
            warn!(key = %key, dropped = received - kept, cursor, "dropped candles behind the cursor");
        }

        let Some(last_ts) = last_ts else {
            warn!(key = %key, received, cursor, "page held no candles past the cursor; stopping");
            break;
        };

        debug!(key = %key, page = pages, received, cursor = next_cursor, "page appended");
        cursor = next_cursor;

        if last_ts > now_ms {
            break;
        }
    }

    let before = series.len();
    series.retain(|c| c.timestamp_ms() <= now_ms);
    if series.len() < before {
        debug!(key = %key, trimmed = before - series.len(), "dropped candles opened after now");
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::source::scripted::{flat_candle, ScriptedSource};
    use chrono::TimeZone;

    const MINUTE: i64 = 60_000;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn since_ms(days: i64) -> i64 {
        (now() - Duration::days(days)).timestamp_millis()
    }

    fn minutes(start: i64, range: std::ops::Range<i64>) -> Vec<crate::market_data::Candle> {
        range.map(|i| flat_candle(start + i * MINUTE, 1.0 + i as f64)).collect()
    }

    fn timestamps(series: &CandleSeries) -> Vec<i64> {
        series.iter().map(|c| c.timestamp_ms()).collect()
    }

    #[tokio::test]
    async fn pages_until_upstream_is_exhausted() {
        let s = since_ms(1);
        let source = ScriptedSource::new()
            .page("ASV/USDT", minutes(s, 0..3))
            .page("ASV/USDT", minutes(s, 3..5));

        let series = fetch_candle_series(
            &source,
            "ASV/USDT",
            Timeframe::OneMinute,
            1,
            now(),
            FetchLimits::default(),
        )
        .await
        .unwrap();

        assert_eq!(timestamps(&series), (0..5).map(|i| s + i * MINUTE).collect::<Vec<_>>());
        // Third call returned the empty page that ended the loop.
        assert_eq!(
            source.cursors("ASV/USDT"),
            vec![s, s + 2 * MINUTE + 1, s + 4 * MINUTE + 1]
        );
    }

    #[tokio::test]
    async fn cursor_strictly_increases() {
        let s = since_ms(2);
        let mut source = ScriptedSource::new();
        for page in 0..6 {
            source = source.page("SUPR/USDT", minutes(s, page * 10..page * 10 + 10));
        }

        fetch_candle_series(
            &source,
            "SUPR/USDT",
            Timeframe::OneMinute,
            2,
            now(),
            FetchLimits::default(),
        )
        .await
        .unwrap();

        let cursors = source.cursors("SUPR/USDT");
        assert_eq!(cursors.len(), 7);
        assert!(cursors.windows(2).all(|w| w[1] > w[0]));
    }

    #[tokio::test]
    async fn stops_once_past_now_and_trims_future_candles() {
        let now_ms = now().timestamp_millis();
        let source = ScriptedSource::new()
            .page("NTX/USDT", vec![flat_candle(now_ms - MINUTE, 1.0), flat_candle(now_ms + MINUTE, 2.0)])
            .page("NTX/USDT", minutes(now_ms, 2..4));

        let series = fetch_candle_series(
            &source,
            "NTX/USDT",
            Timeframe::OneMinute,
            1,
            now(),
            FetchLimits::default(),
        )
        .await
        .unwrap();

        assert_eq!(source.call_count(), 1);
        assert_eq!(timestamps(&series), vec![now_ms - MINUTE]);
    }

    #[tokio::test]
    async fn resent_boundary_candle_is_not_duplicated() {
        let s = since_ms(1);
        let source = ScriptedSource::new()
            .page("RIVAL/USDT", minutes(s, 0..2))
            .page("RIVAL/USDT", minutes(s, 1..4));

        let series = fetch_candle_series(
            &source,
            "RIVAL/USDT",
            Timeframe::OneMinute,
            1,
            now(),
            FetchLimits::default(),
        )
        .await
        .unwrap();

        assert_eq!(timestamps(&series), (0..4).map(|i| s + i * MINUTE).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn page_without_new_candles_ends_the_loop() {
        let s = since_ms(1);
        let source = ScriptedSource::new()
            .page("MIDLE/USDT", minutes(s, 0..2))
            .page("MIDLE/USDT", minutes(s, 0..2))
            .page("MIDLE/USDT", minutes(s, 2..4));

        let series = fetch_candle_series(
            &source,
            "MIDLE/USDT",
            Timeframe::OneMinute,
            1,
            now(),
            FetchLimits::default(),
        )
        .await
        .unwrap();

        assert_eq!(source.call_count(), 2);
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn page_cap_is_an_error_not_a_short_series() {
        let s = since_ms(1);
        let mut source = ScriptedSource::new();
        for (page, price) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
            source = source.page("FARTBOY/USDT", vec![flat_candle(s + page as i64 * MINUTE, price)]);
        }
        let limits = FetchLimits {
            page_limit: 1,
            max_pages: 2,
        };

        let err =
            fetch_candle_series(&source, "FARTBOY/USDT", Timeframe::OneMinute, 1, now(), limits)
                .await
                .unwrap_err();

        assert_eq!(source.call_count(), 2);
        let msg = format!("{err:#}");
        assert!(msg.contains("page cap"), "{msg}");
        assert!(msg.contains("FARTBOY/USDT@1m"), "{msg}");
    }

    #[tokio::test]
    async fn lookback_beyond_calendar_range_is_an_error() {
        let source = ScriptedSource::new();
        let result = fetch_candle_series(
            &source,
            "ASV/USDT",
            Timeframe::OneDay,
            200_000_000,
            now(),
            FetchLimits::default(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn first_page_failure_propagates() {
        let source = ScriptedSource::new().fail("ASV/USDT", "connection refused");

        let err = fetch_candle_series(
            &source,
            "ASV/USDT",
            Timeframe::FiveMinutes,
            5,
            now(),
            FetchLimits::default(),
        )
        .await
        .unwrap_err();

        let msg = format!("{err:#}");
        assert!(msg.contains("connection refused"), "{msg}");
        assert!(msg.contains("ASV/USDT@5m"), "{msg}");
    }

    #[tokio::test]
    async fn later_page_failure_discards_partial_series() {
        let s = since_ms(1);
        let source = ScriptedSource::new()
            .page("ASV/USDT", minutes(s, 0..3))
            .fail("ASV/USDT", "rate limited");

        let result = fetch_candle_series(
            &source,
            "ASV/USDT",
            Timeframe::OneMinute,
            1,
            now(),
            FetchLimits::default(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_upstream_yields_empty_series() {
        let source = ScriptedSource::new();
        let series = fetch_candle_series(
            &source,
            "ASV/USDT",
            Timeframe::OneDay,
            30,
            now(),
            FetchLimits::default(),
        )
        .await
        .unwrap();
        assert!(series.is_empty());
        assert_eq!(source.cursors("ASV/USDT"), vec![since_ms(30)]);
    }
}
