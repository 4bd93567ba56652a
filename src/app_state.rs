// =============================================================================
// Application State - shared by every API handler
// =============================================================================
//
// Read-only after startup: the configuration and the injected candle source.
// Nothing computed here is cached; every request fetches afresh.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::config::DashboardConfig;
use crate::market_data::CandleSource;
use crate::twap::FetchLimits;

pub struct AppState {
    pub config: DashboardConfig,

    /// Upstream market data. MEXC in production, scripted in tests.
    pub source: Arc<dyn CandleSource>,

    /// Instant when the server was started. Used for uptime calculations.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: DashboardConfig, source: Arc<dyn CandleSource>) -> Self {
        Self {
            config,
            source,
            start_time: Instant::now(),
        }
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        self.config.fetch_limits()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
