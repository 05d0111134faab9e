//! R-Factor Scanner Library
//!
//! Scans the NSE F&O stock universe and ranks symbols by R-Factor, a
//! momentum score that weights the day's absolute percent change by a
//! volatility and volume dependent k-factor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  rfactor-scanner (Rust Service)                     │
//! │                           :4440                                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  symbols ─► BatchScanner ─► HistoryFetcher ─► ATR ─► Score ─► rows  │
//! │                                  │                                  │
//! │                       SnapshotCache (TTL, single-flight)            │
//! │                                  │                                  │
//! │                       RateLimiter ─► DataProvider (Yahoo chart)     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## R-Factor
//! - `|% change| * k`, with `k` chosen by one of three move-size tiers
//! - **ACTIVE** from 4.0, **Strong** recommendation from 6.0
//!
//! ## Scan cycle
//! - One pass over a symbol list producing a fresh [`scanner::ScanResult`]
//! - The latest result is replaced wholesale, never mutated

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod export;
pub mod indicators;
pub mod routes;
pub mod scanner;
pub mod scoring;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

use rfactor_common::config::Config;
use rfactor_common::Error;

use crate::data::{
    universe, DataProvider, HistoryFetcher, ScanMode, SnapshotCache, YahooChartAdapter,
};
use crate::scanner::{BatchScanner, ScanObserver, ScanProgress, ScanResult};

// ============================================================================
// Progress Tracking
// ============================================================================

/// Remembers the latest progress notification of the running scan.
#[derive(Default)]
pub struct ProgressTracker {
    running: AtomicBool,
    last: Mutex<Option<ScanProgress>>,
}

impl ProgressTracker {
    /// Whether a scan is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Last notification, if any scan has started
    pub fn last(&self) -> Option<ScanProgress> {
        self.last.lock().ok().and_then(|p| p.clone())
    }

    /// Mark a scan as started. The scan counts as running until the
    /// returned guard is dropped, including when the scan is abandoned.
    fn begin(&self) -> RunningScan<'_> {
        if let Ok(mut last) = self.last.lock() {
            *last = None;
        }
        self.running.store(true, Ordering::SeqCst);
        RunningScan { tracker: self }
    }
}

/// Clears the running flag on drop.
struct RunningScan<'a> {
    tracker: &'a ProgressTracker,
}

impl Drop for RunningScan<'_> {
    fn drop(&mut self) {
        self.tracker.running.store(false, Ordering::SeqCst);
    }
}

impl ScanObserver for ProgressTracker {
    fn on_progress(&self, progress: &ScanProgress) {
        tracing::debug!(message = %progress.message(), "Scan progress");
        if let Ok(mut last) = self.last.lock() {
            *last = Some(progress.clone());
        }
    }
}

// ============================================================================
// Service State
// ============================================================================

/// Scanner service state
pub struct ScannerState {
    /// Configuration
    pub config: Config,
    /// Symbol universe (config override or built-in list)
    pub universe: Vec<String>,
    /// Batch scanner (owns fetcher, cache and pacing)
    pub scanner: Arc<BatchScanner>,
    /// Latest completed scan
    pub latest: RwLock<Option<Arc<ScanResult>>>,
    /// Progress of the running scan
    pub progress: ProgressTracker,
    /// Held for the duration of a scan
    scan_lock: tokio::sync::Mutex<()>,
}

impl ScannerState {
    /// Create state backed by the Yahoo chart provider
    pub fn new(config: Config) -> Self {
        let provider = Arc::new(YahooChartAdapter::from_config(&config.scanner));
        Self::with_provider(config, provider)
    }

    /// Create state backed by an arbitrary provider
    pub fn with_provider(config: Config, provider: Arc<dyn DataProvider>) -> Self {
        let cache = Arc::new(SnapshotCache::with_ttl_secs(config.scanner.cache_ttl_secs));
        let fetcher = Arc::new(HistoryFetcher::from_config(provider, cache, &config.scanner));
        let scanner = Arc::new(BatchScanner::from_config(fetcher, &config.scanner));

        let universe = config
            .scanner
            .universe
            .as_ref()
            .map(universe::normalize_symbols)
            .unwrap_or_else(universe::default_universe);

        Self {
            config,
            universe,
            scanner,
            latest: RwLock::new(None),
            progress: ProgressTracker::default(),
            scan_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one scan and publish it as the latest result.
    ///
    /// Only one scan runs at a time; a second request gets `Conflict`.
    pub async fn run_scan(&self, mode: ScanMode) -> Result<Arc<ScanResult>, Error> {
        let symbols = mode.symbols(&self.universe);
        if symbols.is_empty() {
            return Err(Error::InvalidInput("No symbols to scan".into()));
        }

        let _guard = self
            .scan_lock
            .try_lock()
            .map_err(|_| Error::Conflict("A scan is already running".into()))?;

        tracing::info!(mode = mode.label(), symbols = symbols.len(), "Scan requested");

        let running = self.progress.begin();
        let result = Arc::new(self.scanner.scan(&symbols, &self.progress).await);
        drop(running);

        if let Some(line) = result.failure_summary() {
            tracing::warn!("{}", line);
        }

        *self.latest.write().await = Some(Arc::clone(&result));
        self.scanner.fetcher().cache().clear_expired();

        Ok(result)
    }

    /// Latest completed scan, if any
    pub async fn latest(&self) -> Option<Arc<ScanResult>> {
        self.latest.read().await.clone()
    }
}

// ============================================================================
// Service
// ============================================================================

/// Main scanner service
pub struct ScannerService {
    state: Arc<ScannerState>,
}

impl ScannerService {
    /// Create a new scanner service
    pub fn new(config: Config) -> Self {
        let state = Arc::new(ScannerState::new(config));
        Self { state }
    }

    /// Shared state
    pub fn state(&self) -> Arc<ScannerState> {
        Arc::clone(&self.state)
    }

    /// Start the scanner service
    pub async fn start(self) -> Result<()> {
        let app = routes::router(self.state.clone());

        // Start the auto-refresh loop
        if let Some(secs) = self.state.config.scanner.auto_refresh_secs {
            let refresh_state = self.state.clone();
            tokio::spawn(async move {
                run_auto_refresh(refresh_state, Duration::from_secs(secs)).await;
            });
        }

        // Start HTTP server
        let addr: SocketAddr = self.state.config.bind_address().parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Scanner service stopped");
        Ok(())
    }
}

/// Re-run the default scan every `period`.
async fn run_auto_refresh(state: Arc<ScannerState>, period: Duration) {
    let mode = ScanMode::from(state.config.scanner.default_mode);
    tracing::info!(
        period_secs = period.as_secs(),
        mode = mode.label(),
        "Auto-refresh enabled"
    );

    loop {
        tokio::time::sleep(period).await;

        match state.run_scan(mode.clone()).await {
            Ok(result) => tracing::info!(
                scan_id = %result.scan_id,
                outcome = ?result.outcome,
                "Auto-refresh scan finished"
            ),
            Err(e) => tracing::warn!(error = %e, "Auto-refresh scan skipped"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
