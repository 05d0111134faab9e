//! History fetcher.
//!
//! Turns a provider's bar series into a [`SymbolSnapshot`], guarding against
//! empty or short histories and unusable prices. Outcomes are cached per
//! symbol in an injected [`SnapshotCache`].

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use rfactor_common::config::ScannerConfig;

use super::cache::{CachedFetch, SnapshotCache};
use super::provider::{DataProvider, ProviderError};
use super::rate_limiter::RateLimiter;
use super::{Bar, SymbolSnapshot};
use crate::indicators::atr_from_bars;

/// Why a symbol produced no snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The provider lookup failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider returned no bars
    #[error("Empty history")]
    EmptyHistory,

    /// Too few bars for a meaningful ATR
    #[error("Insufficient history: {bars} bars, {required} required")]
    InsufficientHistory { bars: usize, required: usize },

    /// Latest or previous close is zero or not a number
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

impl FetchError {
    /// Whether the failure came from the transport rather than the data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_transport())
    }
}

/// Default minimum history length.
pub const DEFAULT_MIN_BARS: usize = 14;
/// Default ATR lookback.
pub const DEFAULT_ATR_PERIOD: usize = 14;
/// Default average-volume window.
pub const DEFAULT_VOLUME_WINDOW: usize = 20;

/// Fetches bar history for one symbol and derives its snapshot.
pub struct HistoryFetcher {
    provider: Arc<dyn DataProvider>,
    cache: Arc<SnapshotCache>,
    min_bars: usize,
    atr_period: usize,
    volume_window: usize,
}

impl HistoryFetcher {
    /// Create a fetcher with the default windows (14 bars, ATR 14, volume 20).
    pub fn new(provider: Arc<dyn DataProvider>, cache: Arc<SnapshotCache>) -> Self {
        Self {
            provider,
            cache,
            min_bars: DEFAULT_MIN_BARS,
            atr_period: DEFAULT_ATR_PERIOD,
            volume_window: DEFAULT_VOLUME_WINDOW,
        }
    }

    /// Create from config
    pub fn from_config(
        provider: Arc<dyn DataProvider>,
        cache: Arc<SnapshotCache>,
        config: &ScannerConfig,
    ) -> Self {
        Self::new(provider, cache).with_windows(
            config.min_bars,
            config.atr_period,
            config.volume_window,
        )
    }

    /// Override the history gate and indicator windows.
    pub fn with_windows(mut self, min_bars: usize, atr_period: usize, volume_window: usize) -> Self {
        self.min_bars = min_bars.max(1);
        self.atr_period = atr_period;
        self.volume_window = volume_window.max(1);
        self
    }

    /// Underlying provider
    pub fn provider(&self) -> &Arc<dyn DataProvider> {
        &self.provider
    }

    /// Shared snapshot cache
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Fetch a snapshot, collapsing every failure into `None`.
    pub async fn fetch(&self, symbol: &str) -> Option<SymbolSnapshot> {
        self.fetch_detailed(symbol).await.ok()
    }

    /// Fetch a snapshot, keeping the failure reason.
    pub async fn fetch_detailed(&self, symbol: &str) -> CachedFetch {
        self.fetch_with_limiter(symbol, None).await
    }

    /// Fetch a snapshot; on a cache miss, wait on `limiter` before calling
    /// the provider.
    pub async fn fetch_with_limiter(
        &self,
        symbol: &str,
        limiter: Option<&RateLimiter>,
    ) -> CachedFetch {
        let key = symbol.trim().to_uppercase();
        if key.is_empty() {
            return Err(ProviderError::SymbolNotFound(String::new()).into());
        }

        let result = self
            .cache
            .get_or_fetch(&key, || async {
                if let Some(limiter) = limiter {
                    limiter.acquire().await;
                }
                match self.provider.fetch_bars(&key).await {
                    Ok(bars) => self.build_snapshot(&key, &bars),
                    Err(e) => Err(FetchError::from(e)),
                }
            })
            .await;

        match &result {
            Ok(snapshot) => debug!(
                symbol = %key,
                price = snapshot.current_price,
                prev_close = snapshot.prev_close,
                "Snapshot ready"
            ),
            Err(e) if e.is_transport() => warn!(
                symbol = %key,
                provider = self.provider.name(),
                error = %e,
                "Provider call failed"
            ),
            Err(e) => debug!(symbol = %key, error = %e, "No usable data"),
        }

        result
    }

    /// Derive a snapshot from a bar series ordered by time ascending.
    pub fn build_snapshot(&self, symbol: &str, bars: &[Bar]) -> Result<SymbolSnapshot, FetchError> {
        let Some(last) = bars.last() else {
            return Err(FetchError::EmptyHistory);
        };

        if bars.len() < self.min_bars {
            return Err(FetchError::InsufficientHistory {
                bars: bars.len(),
                required: self.min_bars,
            });
        }

        let current_price = last.close;
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(FetchError::InvalidPrice(format!(
                "latest close is {}",
                current_price
            )));
        }

        let prev_close = if bars.len() > 1 {
            bars[bars.len() - 2].close
        } else {
            current_price
        };
        if !prev_close.is_finite() {
            return Err(FetchError::InvalidPrice(format!(
                "previous close is {}",
                prev_close
            )));
        }

        let volume_of = |bar: &Bar| if bar.volume.is_finite() { bar.volume } else { 0.0 };
        let window = &bars[bars.len().saturating_sub(self.volume_window)..];
        let avg_volume = window.iter().map(volume_of).sum::<f64>() / window.len() as f64;

        Ok(SymbolSnapshot {
            symbol: symbol.to_string(),
            current_price,
            prev_close,
            atr: atr_from_bars(bars, self.atr_period),
            current_volume: volume_of(last),
            avg_volume,
            fetched_at: Utc::now(),
        })
    }
}
