// =============================================================================
// Request Pacer - keeps paginated kline requests under MEXC's rate limits
// =============================================================================
//
// MEXC's public market endpoints allow roughly 20 requests per second per IP.
// Paging through a month of 1m candles is ~43 requests, so consecutive calls
// are spaced by a minimum interval instead of firing back-to-back.
//
// The request counter is atomic; the health endpoint reads it lock-free.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Spaces outgoing requests by at least `min_interval`.
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
    requests_sent: AtomicU64,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
            requests_sent: AtomicU64::new(0),
        }
    }

    /// Wait until the next request slot, then claim it.
    pub async fn wait_turn(&self) {
        let wait = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.min_interval).max(now),
                None => now,
            };
            *last = Some(slot);
            slot - now
        };

        if !wait.is_zero() {
            debug!(?wait, "pacing kline request");
            tokio::time::sleep(wait).await;
        }
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("min_interval", &self.min_interval)
            .field("requests_sent", &self.requests_sent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn consecutive_requests_are_spaced() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        let start = Instant::now();

        pacer.wait_turn().await;
        pacer.wait_turn().await;
        pacer.wait_turn().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(pacer.requests_sent(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_never_waits() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.wait_turn().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(pacer.requests_sent(), 5);
    }
}
