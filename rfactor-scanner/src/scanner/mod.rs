//! Batch scanner.
//!
//! Runs the history fetcher over an ordered symbol list, scores every
//! snapshot and collects failures without aborting the batch.
//!
//! # Pacing
//! Provider calls (cache misses only) pass through a shared
//! [`RateLimiter`](crate::data::RateLimiter), so the aggregate call rate is
//! the same whether symbols are fetched one at a time or by a bounded pool.

mod ranking;
mod record;

pub use ranking::{rank, top_by_direction, ScanFilter, ScanSummary};
pub use record::{assemble, ScanRecord};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use rfactor_common::config::ScannerConfig;
use rfactor_common::logging::generate_trace_id;

use crate::data::{FetchError, HistoryFetcher, SharedRateLimiter, SymbolSnapshot};
use crate::scoring::{self, ScoreResult};

// ============================================================================
// Progress
// ============================================================================

/// Progress notification emitted after each symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// 1-based position of the symbol just processed
    pub index: usize,
    pub total: usize,
    pub symbol: String,
    /// Successes so far
    pub succeeded: usize,
    /// Failures so far
    pub failed: usize,
}

impl ScanProgress {
    /// Fraction of the batch processed, 0.0..=1.0
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.index as f64 / self.total as f64
        }
    }

    /// Status line for progress displays.
    pub fn message(&self) -> String {
        format!(
            "Fetching {}... ({}/{}) | Success: {}",
            self.symbol, self.index, self.total, self.succeeded
        )
    }
}

/// Receives progress notifications during a scan.
pub trait ScanObserver: Send + Sync {
    fn on_progress(&self, progress: &ScanProgress);
}

impl<F> ScanObserver for F
where
    F: Fn(&ScanProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &ScanProgress) {
        self(progress)
    }
}

/// Observer that ignores progress.
pub struct SilentObserver;

impl ScanObserver for SilentObserver {
    fn on_progress(&self, _progress: &ScanProgress) {}
}

// ============================================================================
// Scan Result
// ============================================================================

/// How a scan ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Every symbol produced a record
    Complete,
    /// Some symbols failed
    Partial,
    /// No records: empty input or no symbol had usable data
    NoData,
    /// No records and every failure was a transport failure
    ProviderUnavailable,
}

impl ScanOutcome {
    /// Message for the user, with a retry hint when nothing came back.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Complete => "Scan complete",
            Self::Partial => "Scan complete; some symbols returned no data",
            Self::NoData => "No data loaded. Check the symbol list and try again.",
            Self::ProviderUnavailable => {
                "Market data provider is unreachable. Wait a minute and retry the scan."
            }
        }
    }

    /// Whether the scan produced no records.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoData | Self::ProviderUnavailable)
    }
}

/// Fully materialised output of one scan cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    /// Records in scan order (one per successfully fetched symbol)
    pub records: Vec<ScanRecord>,
    /// Symbols that produced no snapshot, in scan order
    pub failed: Vec<String>,
    pub outcome: ScanOutcome,
    /// Number of symbols requested
    pub total: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ScanResult {
    /// Failure line listing at most ten symbols.
    pub fn failure_summary(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }

        let shown: Vec<&str> = self.failed.iter().take(10).map(String::as_str).collect();
        let mut line = format!(
            "Could not fetch data for {} stocks: {}",
            self.failed.len(),
            shown.join(", ")
        );
        if self.failed.len() > 10 {
            line.push_str(&format!(" and {} more...", self.failed.len() - 10));
        }
        Some(line)
    }
}

/// Snapshot together with its score, for single-symbol diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSnapshot {
    pub snapshot: SymbolSnapshot,
    pub score: ScoreResult,
}

// ============================================================================
// Batch Scanner
// ============================================================================

/// Orchestrates fetch, score and assembly across a symbol list.
pub struct BatchScanner {
    fetcher: Arc<HistoryFetcher>,
    limiter: SharedRateLimiter,
    max_concurrency: usize,
}

impl BatchScanner {
    /// Create a sequential scanner.
    pub fn new(fetcher: Arc<HistoryFetcher>, limiter: SharedRateLimiter) -> Self {
        Self {
            fetcher,
            limiter,
            max_concurrency: 1,
        }
    }

    /// Create from config
    pub fn from_config(fetcher: Arc<HistoryFetcher>, config: &ScannerConfig) -> Self {
        let limiter = crate::data::shared_limiter("provider", config.request_delay_ms);
        Self::new(fetcher, limiter).with_concurrency(config.max_concurrency)
    }

    /// Fetch up to `n` symbols at once. Results stay in input order.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn fetcher(&self) -> &Arc<HistoryFetcher> {
        &self.fetcher
    }

    /// Scan `symbols` in order. Never fails; per-symbol failures end up in
    /// [`ScanResult::failed`].
    pub async fn scan(&self, symbols: &[String], observer: &dyn ScanObserver) -> ScanResult {
        let scan_id = generate_trace_id();
        let total = symbols.len();
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(
            scan_id = %scan_id,
            total,
            concurrency = self.max_concurrency,
            delay_ms = self.limiter.min_interval().as_millis() as u64,
            "Starting scan"
        );

        let mut records = Vec::with_capacity(total);
        let mut failed = Vec::new();
        let mut transport_failures = 0usize;

        let fetches = stream::iter(symbols.iter().cloned())
            .map(move |symbol| async move {
                let outcome = self
                    .fetcher
                    .fetch_with_limiter(&symbol, Some(self.limiter.as_ref()))
                    .await;
                (symbol, outcome)
            })
            .buffered(self.max_concurrency);
        let mut fetches = std::pin::pin!(fetches);

        let mut index = 0;
        while let Some((symbol, outcome)) = fetches.next().await {
            index += 1;

            match outcome {
                Ok(snapshot) => {
                    let score = scoring::score(&snapshot);
                    records.push(assemble(&snapshot, &score));
                }
                Err(e) => {
                    if e.is_transport() {
                        transport_failures += 1;
                    }
                    debug!(symbol = %symbol, error = %e, "Symbol skipped");
                    failed.push(symbol.clone());
                }
            }

            observer.on_progress(&ScanProgress {
                index,
                total,
                symbol,
                succeeded: records.len(),
                failed: failed.len(),
            });
        }

        let outcome = if !records.is_empty() {
            if failed.is_empty() {
                ScanOutcome::Complete
            } else {
                ScanOutcome::Partial
            }
        } else if !failed.is_empty() && transport_failures == failed.len() {
            ScanOutcome::ProviderUnavailable
        } else {
            ScanOutcome::NoData
        };

        let result = ScanResult {
            scan_id,
            records,
            failed,
            outcome,
            total,
            started_at,
            completed_at: Utc::now(),
        };

        if outcome.is_empty() && total > 0 {
            warn!(
                scan_id = %result.scan_id,
                total,
                outcome = ?outcome,
                "Scan returned no records"
            );
        } else {
            info!(
                scan_id = %result.scan_id,
                total,
                succeeded = result.records.len(),
                failed = result.failed.len(),
                duration_ms = clock.elapsed().as_millis() as u64,
                "Scan finished"
            );
        }

        result
    }

    /// Fetch and score one symbol, keeping the failure reason.
    pub async fn diagnose(&self, symbol: &str) -> Result<ScoredSnapshot, FetchError> {
        let snapshot = self
            .fetcher
            .fetch_with_limiter(symbol, Some(self.limiter.as_ref()))
            .await?;
        let score = scoring::score(&snapshot);
        Ok(ScoredSnapshot { snapshot, score })
    }

    /// Fetch and score one symbol.
    pub async fn fetch_one(&self, symbol: &str) -> Option<ScoredSnapshot> {
        self.diagnose(symbol).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_failures(n: usize) -> ScanResult {
        ScanResult {
            scan_id: "test".into(),
            records: Vec::new(),
            failed: (0..n).map(|i| format!("S{}", i)).collect(),
            outcome: ScanOutcome::NoData,
            total: n,
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_progress_message() {
        let progress = ScanProgress {
            index: 3,
            total: 50,
            symbol: "HDFCAMC".into(),
            succeeded: 2,
            failed: 1,
        };
        assert_eq!(progress.message(), "Fetching HDFCAMC... (3/50) | Success: 2");
        assert!((progress.fraction() - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_failure_summary() {
        assert!(result_with_failures(0).failure_summary().is_none());
        assert_eq!(
            result_with_failures(2).failure_summary().unwrap(),
            "Could not fetch data for 2 stocks: S0, S1"
        );
        assert!(result_with_failures(13)
            .failure_summary()
            .unwrap()
            .ends_with("S9 and 3 more..."));
    }

    #[test]
    fn test_outcome_messages() {
        assert!(ScanOutcome::ProviderUnavailable.user_message().contains("retry"));
        assert!(ScanOutcome::NoData.is_empty());
        assert!(!ScanOutcome::Partial.is_empty());
    }

    #[test]
    fn test_closure_observer() {
        let seen = std::sync::Mutex::new(Vec::new());
        let observer = |p: &ScanProgress| seen.lock().unwrap().push(p.index);
        observer.on_progress(&ScanProgress {
            index: 1,
            total: 1,
            symbol: "X".into(),
            succeeded: 1,
            failed: 0,
        });
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }
}
