//! R-Factor scoring.
//!
//! Combines the percent price change, ATR-normalised volatility and volume
//! surge of a snapshot into one composite score:
//!
//! ```text
//! pct_change   = (price - prev_close) / prev_close * 100
//! atr_pct      = atr / price * 100
//! volume_ratio = volume / avg_volume        (1.0 when avg_volume <= 0)
//! boost        = sqrt(volume_ratio)
//!
//! |pct_change| >= 5.0  ->  k = 0.75 + (boost - 1) * 0.05
//! |pct_change| >= 2.5  ->  k = 0.75 + (boost - 1) * 0.25 + atr_pct * 0.10
//! otherwise            ->  k = 1.00 + (boost - 1) * 0.50 + atr_pct * 0.15
//!
//! r_factor = |pct_change| * k
//! ```
//!
//! Breakpoints and coefficients are tuned against known reference values and
//! must stay exactly as written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::data::SymbolSnapshot;

// ============================================================================
// Constants
// ============================================================================

/// Base k-factor for the two large-move tiers
pub const BASE_K: f64 = 0.75;
/// Absolute % change from which the strong-move tier applies
pub const STRONG_MOVE_PCT: f64 = 5.0;
/// Absolute % change from which the moderate-move tier applies
pub const MODERATE_MOVE_PCT: f64 = 2.5;
/// Score from which a signal is actionable
pub const ACTIVE_THRESHOLD: f64 = 4.0;
/// Score from which the recommendation is "Strong"
pub const STRONG_THRESHOLD: f64 = 6.0;
/// Score from which the symbol is worth watching
pub const WATCH_THRESHOLD: f64 = 3.0;

/// Round to two decimals for display. Exact ties go to the even digit.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

// ============================================================================
// Labels
// ============================================================================

/// Direction of the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Upside,
    Downside,
    /// The score could not be computed
    #[serde(rename = "N/A")]
    Unknown,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upside => write!(f, "UPSIDE"),
            Self::Downside => write!(f, "DOWNSIDE"),
            Self::Unknown => write!(f, "N/A"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upside" | "up" | "call" => Ok(Self::Upside),
            "downside" | "down" | "put" => Ok(Self::Downside),
            "n/a" | "na" | "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Whether the score is strong enough to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Active,
    Wait,
    /// The score could not be computed
    Error,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Wait => write!(f, "WAIT"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "wait" => Ok(Self::Wait),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown signal '{}'", other)),
        }
    }
}

/// Recommendation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongCall,
    StrongPut,
    CallActive,
    PutActive,
    Watch,
    Avoid,
    /// No tier; see the score error
    Unscored,
}

impl Recommendation {
    /// Tier for a score in a direction.
    pub fn for_score(score: f64, direction: Direction) -> Self {
        let upside = direction == Direction::Upside;
        if score >= STRONG_THRESHOLD {
            if upside {
                Self::StrongCall
            } else {
                Self::StrongPut
            }
        } else if score >= ACTIVE_THRESHOLD {
            if upside {
                Self::CallActive
            } else {
                Self::PutActive
            }
        } else if score >= WATCH_THRESHOLD {
            Self::Watch
        } else {
            Self::Avoid
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::StrongCall => "Strong Call",
            Self::StrongPut => "Strong Put",
            Self::CallActive => "Call — Active",
            Self::PutActive => "Put — Active",
            Self::Watch => "Watch for confirmation",
            Self::Avoid => "Avoid — weak momentum",
            Self::Unscored => "Unscored",
        };
        f.write_str(text)
    }
}

// ============================================================================
// Score Result
// ============================================================================

/// Why a snapshot could not be scored.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreError {
    /// Previous close or current price is zero or not a number
    #[error("Invalid baseline: prev_close={prev_close}, current_price={current_price}")]
    InvalidBaseline { prev_close: f64, current_price: f64 },

    /// The computation produced a non-finite value
    #[error("Non-finite {field}")]
    NonFinite { field: String },
}

/// Output of scoring one snapshot.
///
/// Numeric fields are rounded to two decimals; `signal` and
/// `recommendation` are derived from the unrounded score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub pct_change: f64,
    pub atr_pct: f64,
    pub volume_ratio: f64,
    pub k_factor: f64,
    pub r_factor: f64,
    pub direction: Direction,
    pub signal: Signal,
    pub recommendation: Recommendation,
    /// Present when the inputs could not be scored; all numbers are then zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScoreError>,
}

impl ScoreResult {
    /// Zeroed, error-tagged result.
    pub fn failed(error: ScoreError) -> Self {
        Self {
            pct_change: 0.0,
            atr_pct: 0.0,
            volume_ratio: 0.0,
            k_factor: 0.0,
            r_factor: 0.0,
            direction: Direction::Unknown,
            signal: Signal::Error,
            recommendation: Recommendation::Unscored,
            error: Some(error),
        }
    }

    /// Whether this result carries a real score.
    pub fn is_scored(&self) -> bool {
        self.error.is_none()
    }

    /// Recommendation text, or the error message for unscored results.
    pub fn recommendation_text(&self) -> String {
        match &self.error {
            Some(e) => e.to_string(),
            None => self.recommendation.to_string(),
        }
    }
}

// ============================================================================
// Calculation
// ============================================================================

/// Tiered k-factor.
pub fn k_factor(abs_change: f64, volume_boost: f64, atr_pct: f64) -> f64 {
    if abs_change >= STRONG_MOVE_PCT {
        BASE_K + (volume_boost - 1.0) * 0.05
    } else if abs_change >= MODERATE_MOVE_PCT {
        BASE_K + (volume_boost - 1.0) * 0.25 + atr_pct * 0.1
    } else {
        1.0 + (volume_boost - 1.0) * 0.5 + atr_pct * 0.15
    }
}

/// Score raw inputs. Total: invalid input yields an error-tagged result.
pub fn score_values(
    current_price: f64,
    prev_close: f64,
    atr: f64,
    current_volume: f64,
    avg_volume: f64,
) -> ScoreResult {
    let valid_price = |p: f64| p.is_finite() && p != 0.0;
    if !valid_price(prev_close) || !valid_price(current_price) {
        return ScoreResult::failed(ScoreError::InvalidBaseline {
            prev_close,
            current_price,
        });
    }

    let pct_change = (current_price - prev_close) / prev_close * 100.0;
    let atr_pct = atr / current_price * 100.0;
    let volume_ratio = if avg_volume > 0.0 {
        current_volume / avg_volume
    } else {
        1.0
    };
    let volume_boost = volume_ratio.sqrt();

    let abs_change = pct_change.abs();
    let k = k_factor(abs_change, volume_boost, atr_pct);
    let r_factor = abs_change * k;

    for (field, value) in [
        ("atr_pct", atr_pct),
        ("volume_ratio", volume_ratio),
        ("k_factor", k),
        ("r_factor", r_factor),
    ] {
        if !value.is_finite() {
            return ScoreResult::failed(ScoreError::NonFinite {
                field: field.to_string(),
            });
        }
    }

    // Zero change falls on the downside
    let direction = if pct_change > 0.0 {
        Direction::Upside
    } else {
        Direction::Downside
    };

    let signal = if r_factor >= ACTIVE_THRESHOLD {
        Signal::Active
    } else {
        Signal::Wait
    };

    ScoreResult {
        pct_change: round2(pct_change),
        atr_pct: round2(atr_pct),
        volume_ratio: round2(volume_ratio),
        k_factor: round2(k),
        r_factor: round2(r_factor),
        direction,
        signal,
        recommendation: Recommendation::for_score(r_factor, direction),
        error: None,
    }
}

/// Score a snapshot.
pub fn score(snapshot: &SymbolSnapshot) -> ScoreResult {
    score_values(
        snapshot.current_price,
        snapshot.prev_close,
        snapshot.atr,
        snapshot.current_volume,
        snapshot.avg_volume,
    )
}

// ============================================================================
// Tests
// ============================================================================
