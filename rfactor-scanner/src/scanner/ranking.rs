//! Filtering, ranking and dashboard metrics over scan records.

use serde::{Deserialize, Serialize};

use super::record::ScanRecord;
use crate::scoring::{Direction, Signal};

/// Which rows to show.
///
/// An empty list accepts every value for that column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilter {
    #[serde(default)]
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub directions: Vec<Direction>,
}

impl Default for ScanFilter {
    /// Scored rows only: ACTIVE and WAIT, both directions.
    fn default() -> Self {
        Self {
            signals: vec![Signal::Active, Signal::Wait],
            directions: vec![Direction::Upside, Direction::Downside],
        }
    }
}

impl ScanFilter {
    /// Accept every row, including unscored ones.
    pub fn all() -> Self {
        Self {
            signals: Vec::new(),
            directions: Vec::new(),
        }
    }

    /// Restrict to the given signals.
    pub fn with_signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals = signals;
        self
    }

    /// Restrict to the given directions.
    pub fn with_directions(mut self, directions: Vec<Direction>) -> Self {
        self.directions = directions;
        self
    }

    pub fn matches(&self, record: &ScanRecord) -> bool {
        (self.signals.is_empty() || self.signals.contains(&record.signal))
            && (self.directions.is_empty() || self.directions.contains(&record.direction))
    }
}

/// Filter, then sort by R-Factor descending. Ties keep scan order.
pub fn rank(records: &[ScanRecord], filter: &ScanFilter) -> Vec<ScanRecord> {
    let mut ranked: Vec<ScanRecord> = records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();

    ranked.sort_by(|a, b| b.r_factor.total_cmp(&a.r_factor));
    ranked
}

/// Best `n` rows in one direction from an already ranked list.
pub fn top_by_direction(ranked: &[ScanRecord], direction: Direction, n: usize) -> Vec<ScanRecord> {
    ranked
        .iter()
        .filter(|r| r.direction == direction)
        .take(n)
        .cloned()
        .collect()
}

/// Headline metrics for a scan.
///
/// `total` counts every record; the remaining figures describe the
/// filtered rows, except `active_pct`, which is relative to `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub shown: usize,
    pub active: usize,
    pub active_pct: f64,
    pub avg_r_factor: f64,
    pub upside: usize,
    pub upside_pct: f64,
    pub downside: usize,
    pub downside_pct: f64,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl ScanSummary {
    /// Compute metrics for `shown` rows taken from `all`.
    pub fn compute(all: &[ScanRecord], shown: &[ScanRecord]) -> Self {
        let total = all.len();
        let active = shown.iter().filter(|r| r.is_active()).count();
        let upside = shown.iter().filter(|r| r.direction == Direction::Upside).count();
        let downside = shown.iter().filter(|r| r.direction == Direction::Downside).count();
        let avg_r_factor = if shown.is_empty() {
            0.0
        } else {
            shown.iter().map(|r| r.r_factor).sum::<f64>() / shown.len() as f64
        };

        Self {
            total,
            shown: shown.len(),
            active,
            active_pct: percent(active, total),
            avg_r_factor,
            upside,
            upside_pct: percent(upside, shown.len()),
            downside,
            downside_pct: percent(downside, shown.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(symbol: &str, r_factor: f64, direction: Direction) -> ScanRecord {
        let signal = match direction {
            Direction::Unknown => Signal::Error,
            _ if r_factor >= 4.0 => Signal::Active,
            _ => Signal::Wait,
        };
        ScanRecord {
            symbol: symbol.into(),
            ltp: 100.0,
            prev_close: 100.0,
            change_pct: 0.0,
            atr: 1.0,
            atr_pct: 1.0,
            volume: 10,
            avg_volume: 10,
            vol_ratio: 1.0,
            r_factor,
            k_factor: 1.0,
            signal,
            direction,
            recommendation: String::new(),
            timestamp: "09:15:00".into(),
            fetched_at: Utc::now(),
        }
    }

    fn sample() -> Vec<ScanRecord> {
        vec![
            record("A", 3.0, Direction::Upside),
            record("B", 7.5, Direction::Downside),
            record("C", 4.2, Direction::Upside),
            record("D", 3.0, Direction::Downside),
            record("E", 0.0, Direction::Unknown),
        ]
    }

    fn symbols(records: &[ScanRecord]) -> Vec<&str> {
        records.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn test_rank_sorts_descending_and_is_stable() {
        let ranked = rank(&sample(), &ScanFilter::default());
        // A and D tie at 3.0 and keep scan order; E is unscored and hidden
        assert_eq!(symbols(&ranked), vec!["B", "C", "A", "D"]);
    }

    #[test]
    fn test_filters() {
        let all = sample();

        let active = rank(&all, &ScanFilter::default().with_signals(vec![Signal::Active]));
        assert_eq!(symbols(&active), vec!["B", "C"]);

        let upside = rank(&all, &ScanFilter::default().with_directions(vec![Direction::Upside]));
        assert_eq!(symbols(&upside), vec!["C", "A"]);

        assert_eq!(rank(&all, &ScanFilter::all()).len(), 5);
    }

    #[test]
    fn test_top_by_direction() {
        let ranked = rank(&sample(), &ScanFilter::default());
        assert_eq!(symbols(&top_by_direction(&ranked, Direction::Upside, 10)), vec!["C", "A"]);
        assert_eq!(symbols(&top_by_direction(&ranked, Direction::Downside, 1)), vec!["B"]);
    }

    #[test]
    fn test_summary() {
        let all = sample();
        let shown = rank(&all, &ScanFilter::default());
        let summary = ScanSummary::compute(&all, &shown);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.shown, 4);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.active_pct, 40.0);
        assert!((summary.avg_r_factor - 4.425).abs() < 1e-9);
        assert_eq!(summary.upside, 2);
        assert_eq!(summary.upside_pct, 50.0);
        assert_eq!(summary.downside_pct, 50.0);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = ScanSummary::compute(&[], &[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.avg_r_factor, 0.0);
        assert_eq!(summary.active_pct, 0.0);
    }
}
