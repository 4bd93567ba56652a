// =============================================================================
// Dashboard Configuration - token options, defaults, exchange settings
// =============================================================================
//
// Loaded once at startup from `dashboard_config.json`. All fields carry
// `#[serde(default)]` so a partial (or missing) file still yields a usable
// configuration. A handful of environment variables override the file.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::exchange::client::{MAX_KLINES_PER_REQUEST, MEXC_BASE_URL};
use crate::twap::FetchLimits;
use crate::types::Timeframe;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    [
        "MIDLE/USDT",
        "RIVAL/USDT",
        "FARTBOY/USDT",
        "ASV/USDT",
        "SUPR/USDT",
        "NTX/USDT",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_selected_symbols() -> Vec<String> {
    vec!["FARTBOY/USDT".to_string()]
}

fn default_lookback_days() -> u32 {
    5
}

fn default_max_lookback_days() -> u32 {
    30
}

fn default_page_limit() -> u32 {
    MAX_KLINES_PER_REQUEST
}

fn default_max_pages() -> usize {
    10_000
}

fn default_exchange_base_url() -> String {
    MEXC_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_min_request_interval_ms() -> u64 {
    50
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// DashboardConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    // --- Selection widgets ---------------------------------------------------

    /// Pairs offered in the dashboard's multiselect, in unified `BASE/QUOTE`
    /// form.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Pairs pre-selected when the dashboard opens.
    #[serde(default = "default_selected_symbols")]
    pub default_symbols: Vec<String>,

    #[serde(default)]
    pub default_timeframe: Timeframe,

    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: u32,

    /// Upper bound of the day slider; requests above it are rejected.
    #[serde(default = "default_max_lookback_days")]
    pub max_lookback_days: u32,

    // --- Fetching -----------------------------------------------------------

    /// Candles requested per page (MEXC caps this at 1000).
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_exchange_base_url")]
    pub exchange_base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Minimum spacing between consecutive exchange requests.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    // --- Server -------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            default_symbols: default_selected_symbols(),
            default_timeframe: Timeframe::default(),
            default_lookback_days: default_lookback_days(),
            max_lookback_days: default_max_lookback_days(),
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
            exchange_base_url: default_exchange_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dashboard config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse dashboard config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            exchange = %config.exchange_base_url,
            "dashboard config loaded"
        );

        Ok(config)
    }

    /// Apply `TWAP_SYMBOLS`, `TWAP_BIND_ADDR` and `TWAP_EXCHANGE_URL` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(syms) = lookup("TWAP_SYMBOLS") {
            let symbols: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !symbols.is_empty() {
                self.symbols = symbols;
            }
        }
        if let Some(addr) = lookup("TWAP_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(url) = lookup("TWAP_EXCHANGE_URL") {
            self.exchange_base_url = url;
        }
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            page_limit: self.page_limit.clamp(1, MAX_KLINES_PER_REQUEST),
            max_pages: self.max_pages.max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.symbols.len(), 6);
        assert_eq!(cfg.symbols[0], "MIDLE/USDT");
        assert_eq!(cfg.default_symbols, vec!["FARTBOY/USDT"]);
        assert_eq!(cfg.default_timeframe, Timeframe::OneMinute);
        assert_eq!(cfg.default_lookback_days, 5);
        assert_eq!(cfg.max_lookback_days, 30);
        assert_eq!(cfg.page_limit, 1000);
        assert_eq!(cfg.exchange_base_url, "https://api.mexc.com");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "default_timeframe": "15m", "symbols": ["ASV/USDT"], "page_limit": 5000 }"#;
        let cfg: DashboardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.default_timeframe, Timeframe::FifteenMinutes);
        assert_eq!(cfg.symbols, vec!["ASV/USDT"]);
        assert_eq!(cfg.default_lookback_days, 5);
        assert_eq!(cfg.fetch_limits().page_limit, 1000);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: DashboardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.min_request_interval(), Duration::from_millis(50));
    }

    #[test]
    fn env_overrides_replace_symbols_and_addresses() {
        let vars: HashMap<&str, &str> = [
            ("TWAP_SYMBOLS", " supr/usdt, ,ntx/usdt "),
            ("TWAP_BIND_ADDR", "127.0.0.1:9000"),
        ]
        .into_iter()
        .collect();

        let mut cfg = DashboardConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.symbols, vec!["SUPR/USDT", "NTX/USDT"]);
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.exchange_base_url, "https://api.mexc.com");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(DashboardConfig::load("/nonexistent/dashboard_config.json").is_err());
    }
}
