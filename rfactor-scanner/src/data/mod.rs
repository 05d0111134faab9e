//! Market data module for NSE F&O equities.
//!
//! Provides history fetching, snapshot caching, and call pacing for the
//! scoring pipeline.
//!
//! # Data Sources
//! - **Yahoo Finance chart API** (default): daily OHLCV bars, one month window
//!
//! Any other source can be plugged in by implementing [`DataProvider`].

mod cache;
mod fetcher;
mod provider;
mod rate_limiter;
pub mod universe;
mod yahoo;

pub use cache::{CacheStats, CachedFetch, SnapshotCache};
pub use fetcher::{FetchError, HistoryFetcher};
pub use provider::{DataProvider, ProviderError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use universe::{ScanMode, FNO_UNIVERSE, TEST_SYMBOLS};
pub use yahoo::YahooChartAdapter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// One trading-period OHLCV observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Period open time
    pub timestamp: DateTime<Utc>,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Traded volume
    pub volume: f64,
}

impl Bar {
    /// True range against the previous bar's close.
    pub fn true_range(&self, prev_close: f64) -> f64 {
        crate::indicators::true_range(self.high, self.low, prev_close)
    }
}

/// Fetched-and-derived numeric state for one symbol at one point in time.
///
/// A snapshot only exists when every field is populated and the current
/// price is positive; failed or insufficient lookups never produce one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    /// Symbol as listed in the universe (without market suffix)
    pub symbol: String,
    /// Latest close
    pub current_price: f64,
    /// Second-to-last close (latest close when only one bar exists)
    pub prev_close: f64,
    /// Average true range over the configured period
    pub atr: f64,
    /// Latest bar's volume
    pub current_volume: f64,
    /// Mean volume over the trailing window
    pub avg_volume: f64,
    /// When the underlying history was retrieved
    pub fetched_at: DateTime<Utc>,
}
