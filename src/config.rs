use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

/// Seconds in one trading year (252 sessions of 6.5 hours) — converts the
/// scheduler interval into the annualized time unit of `drift`/`volatility`.
pub const SECONDS_PER_TRADING_YEAR: f64 = 252.0 * 6.5 * 3600.0;

/// GBM generator parameters
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GbmConfig {
    /// Annualized drift (mu)
    pub drift: f64,
    /// Annualized volatility (sigma)
    pub volatility: f64,
    /// Lower bound keeping generated prices strictly positive
    pub price_floor: f64,
    /// Seed price for symbols with no cached quote yet
    pub initial_price: f64,
    /// Optional base seed for reproducible per-symbol random streams
    pub seed: Option<u64>,
}

impl Default for GbmConfig {
    fn default() -> Self {
        Self {
            drift: 0.05,
            volatility: 0.20,
            price_floor: 0.01,
            initial_price: 100.0,
            seed: None,
        }
    }
}

/// Historical replay parameters
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReplayConfig {
    /// Path to the JSON dataset file
    pub dataset_path: String,
    /// Wrap around at the end of each symbol's sequence
    pub replay_loop: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            dataset_path: "data/history.json".to_string(),
            replay_loop: true,
        }
    }
}

/// Live feed (AMQP) parameters
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedConfig {
    /// AMQP URI; the live adapter is disabled when absent
    pub amqp_uri: Option<String>,
    /// Topic exchange carrying one JSON tick per message
    pub exchange: String,
    /// Initial reconnect delay in milliseconds
    pub reconnect_base_ms: u64,
    /// Reconnect delay cap in milliseconds
    pub reconnect_cap_ms: u64,
    /// Consecutive failures tolerated before the feed is declared down
    pub max_reconnect_attempts: u32,
    /// Switch to GBM simulation when the feed is declared down
    pub fallback_to_simulation: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            amqp_uri: None,
            exchange: "stock_updates".to_string(),
            reconnect_base_ms: 1_000,
            reconnect_cap_ms: 30_000,
            max_reconnect_attempts: 5,
            fallback_to_simulation: true,
        }
    }
}

/// Engine configuration, assembled from the environment at startup
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bind_addr: String,
    /// Scheduler period for the active simulation source
    pub tick_interval_ms: u64,
    pub default_currency: String,
    pub gbm: GbmConfig,
    pub replay: ReplayConfig,
    pub feed: FeedConfig,
    /// Symbol universe used when no database is configured
    pub fallback_symbols: Vec<String>,
    /// Days of price history retained by the pruning job
    pub history_retention_days: i64,
}

impl EngineConfig {
    /// Build configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let gbm = GbmConfig {
            drift: env_parse("GBM_DRIFT", 0.05),
            volatility: env_parse("GBM_VOLATILITY", 0.20),
            price_floor: env_parse("GBM_PRICE_FLOOR", 0.01),
            initial_price: env_parse("GBM_INITIAL_PRICE", 100.0),
            seed: std::env::var("GBM_SEED").ok().and_then(|v| v.parse().ok()),
        };

        let replay = ReplayConfig {
            dataset_path: std::env::var("HISTORY_DATASET")
                .unwrap_or_else(|_| "data/history.json".to_string()),
            replay_loop: env_parse("REPLAY_LOOP", true),
        };

        let feed = FeedConfig {
            amqp_uri: std::env::var("AMQP_URI").ok(),
            exchange: std::env::var("FEED_EXCHANGE").unwrap_or_else(|_| "stock_updates".to_string()),
            reconnect_base_ms: env_parse("FEED_RECONNECT_BASE_MS", 1_000),
            reconnect_cap_ms: env_parse("FEED_RECONNECT_CAP_MS", 30_000),
            max_reconnect_attempts: env_parse("FEED_MAX_RECONNECT_ATTEMPTS", 5),
            fallback_to_simulation: env_parse("FEED_FALLBACK_TO_SIMULATION", true),
        };

        let fallback_symbols = std::env::var("TRACKED_SYMBOLS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| default_symbols());

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            tick_interval_ms: env_parse("TICK_INTERVAL_MS", 2_000),
            default_currency: std::env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            gbm,
            replay,
            feed,
            fallback_symbols,
            history_retention_days: env_parse("HISTORY_RETENTION_DAYS", 30),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Scheduler interval expressed in trading years, the `dt` of the GBM step
    pub fn dt_years(&self) -> f64 {
        self.tick_interval_ms as f64 / 1_000.0 / SECONDS_PER_TRADING_YEAR
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            tick_interval_ms: 2_000,
            default_currency: "INR".to_string(),
            gbm: GbmConfig::default(),
            replay: ReplayConfig::default(),
            feed: FeedConfig::default(),
            fallback_symbols: default_symbols(),
            history_retention_days: 30,
        }
    }
}

fn default_symbols() -> Vec<String> {
    ["RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "BTC-USD"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval_ms, 2_000);
        assert_eq!(config.feed.exchange, "stock_updates");
        assert_eq!(config.feed.reconnect_base_ms, 1_000);
        assert_eq!(config.feed.reconnect_cap_ms, 30_000);
        assert!(config.replay.replay_loop);
        assert_eq!(config.fallback_symbols.len(), 5);
    }

    #[test]
    fn test_dt_years_matches_interval() {
        let config = EngineConfig {
            tick_interval_ms: 1_000,
            ..Default::default()
        };
        let expected = 1.0 / SECONDS_PER_TRADING_YEAR;
        assert!((config.dt_years() - expected).abs() < f64::EPSILON);
    }
}
