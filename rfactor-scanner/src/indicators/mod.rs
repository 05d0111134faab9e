//! Technical indicators computed from bar series.

mod atr;

pub use atr::{atr_from_bars, average_true_range, true_range};
