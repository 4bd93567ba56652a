// =============================================================================
// Candle Source - the upstream market-data seam
// =============================================================================
//
// The fetcher only ever talks to this trait. The MEXC REST client implements
// it for production; tests substitute a scripted source.
// =============================================================================

use anyhow::Result;
use async_trait::async_trait;

use crate::market_data::Candle;
use crate::types::Timeframe;

/// Anything that can answer "candles for symbol/timeframe since T, at most N".
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Short name used in logs and health output.
    fn name(&self) -> &'static str;

    /// Return up to `limit` candles with open time `>= since_ms`, oldest first.
    ///
    /// An empty vector means the upstream has nothing more for that range.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since_ms: i64,
        limit: u32,
    ) -> Result<Vec<Candle>>;

    /// Requests issued so far, when the source tracks it.
    fn requests_sent(&self) -> u64 {
        0
    }
}

#[cfg(test)]
pub mod scripted {
    //! Deterministic in-memory source for tests.

    use std::collections::{HashMap, VecDeque};

    use anyhow::anyhow;
    use parking_lot::Mutex;

    use super::*;

    /// One scripted reply to a `fetch_ohlcv` call.
    pub enum Reply {
        Page(Vec<Candle>),
        Fail(String),
    }

    /// Replays queued replies per symbol and records every `since_ms` it saw.
    #[derive(Default)]
    pub struct ScriptedSource {
        replies: Mutex<HashMap<String, VecDeque<Reply>>>,
        calls: Mutex<Vec<(String, i64, u32)>>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(self, symbol: &str, candles: Vec<Candle>) -> Self {
            self.push(symbol, Reply::Page(candles))
        }

        pub fn fail(self, symbol: &str, message: &str) -> Self {
            self.push(symbol, Reply::Fail(message.to_string()))
        }

        fn push(self, symbol: &str, reply: Reply) -> Self {
            self.replies
                .lock()
                .entry(symbol.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        /// Cursors passed to `fetch_ohlcv`, in call order.
        pub fn cursors(&self, symbol: &str) -> Vec<i64> {
            self.calls
                .lock()
                .iter()
                .filter(|(s, _, _)| s == symbol)
                .map(|(_, since, _)| *since)
                .collect()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl CandleSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_ohlcv(
            &self,
            symbol: &str,
            _timeframe: Timeframe,
            since_ms: i64,
            limit: u32,
        ) -> Result<Vec<Candle>> {
            self.calls.lock().push((symbol.to_string(), since_ms, limit));
            let next = self
                .replies
                .lock()
                .get_mut(symbol)
                .and_then(VecDeque::pop_front);
            match next {
                Some(Reply::Page(candles)) => Ok(candles),
                Some(Reply::Fail(message)) => Err(anyhow!(message)),
                None => Ok(Vec::new()),
            }
        }

        fn requests_sent(&self) -> u64 {
            self.call_count() as u64
        }
    }

    /// Flat candle whose typical price equals `price`.
    pub fn flat_candle(open_time_ms: i64, price: f64) -> Candle {
        Candle::from_millis(open_time_ms, price, price, price, price, 1.0)
            .expect("test timestamp in range")
    }
}
