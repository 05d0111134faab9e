//! Average True Range.
//!
//! True range for bar `i` (from the second bar on) is the widest of
//! `high - low`, `|high - prev_close|` and `|low - prev_close|`. ATR is the
//! mean of the last `period` true ranges, or of all of them when fewer exist.
//!
//! ATR never fails: empty, single-bar, ragged or non-finite input yields 0,
//! which downstream scoring reads as "no volatility signal".

use crate::data::Bar;

/// True range of one period against the previous close.
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Mean of the trailing `period` values (all values if fewer, 0 if none).
fn trailing_mean(ranges: &[f64], period: usize) -> f64 {
    if ranges.is_empty() {
        return 0.0;
    }

    let window = if period > 0 && ranges.len() >= period {
        &ranges[ranges.len() - period..]
    } else {
        ranges
    };

    let atr = window.iter().sum::<f64>() / window.len() as f64;
    if atr.is_finite() {
        atr
    } else {
        0.0
    }
}

/// ATR over parallel high/low/close columns.
///
/// Columns of different lengths are treated as malformed and yield 0.
pub fn average_true_range(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> f64 {
    let n = closes.len();
    if highs.len() != n || lows.len() != n || n < 2 {
        return 0.0;
    }

    let ranges: Vec<f64> = (1..n)
        .map(|i| true_range(highs[i], lows[i], closes[i - 1]))
        .collect();

    trailing_mean(&ranges, period)
}

/// ATR over a bar series ordered by time ascending.
pub fn atr_from_bars(bars: &[Bar], period: usize) -> f64 {
    let ranges: Vec<f64> = bars
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect();

    trailing_mean(&ranges, period)
}
