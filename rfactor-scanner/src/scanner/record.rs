//! Scan records: one display row per scored symbol.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::data::SymbolSnapshot;
use crate::scoring::{Direction, ScoreResult, Signal};

/// Row consumed by the presentation layer and the CSV export.
///
/// Prices and ATR are kept at full precision; derived ratios come from the
/// two-decimal [`ScoreResult`]; volumes are truncated to whole shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub symbol: String,
    /// Last traded price (latest close)
    pub ltp: f64,
    pub prev_close: f64,
    pub change_pct: f64,
    pub atr: f64,
    pub atr_pct: f64,
    pub volume: u64,
    pub avg_volume: u64,
    pub vol_ratio: f64,
    pub r_factor: f64,
    pub k_factor: f64,
    pub signal: Signal,
    pub direction: Direction,
    pub recommendation: String,
    /// Local wall-clock fetch time, `HH:MM:SS`
    pub timestamp: String,
    pub fetched_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Whether the row carries an actionable signal.
    pub fn is_active(&self) -> bool {
        self.signal == Signal::Active
    }
}

/// Join a snapshot and its score into a display row.
pub fn assemble(snapshot: &SymbolSnapshot, score: &ScoreResult) -> ScanRecord {
    ScanRecord {
        symbol: snapshot.symbol.clone(),
        ltp: snapshot.current_price,
        prev_close: snapshot.prev_close,
        change_pct: score.pct_change,
        atr: snapshot.atr,
        atr_pct: score.atr_pct,
        volume: snapshot.current_volume as u64,
        avg_volume: snapshot.avg_volume as u64,
        vol_ratio: score.volume_ratio,
        r_factor: score.r_factor,
        k_factor: score.k_factor,
        signal: score.signal,
        direction: score.direction,
        recommendation: score.recommendation_text(),
        timestamp: snapshot
            .fetched_at
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string(),
        fetched_at: snapshot.fetched_at,
    }
}
