//! CSV export of scan records.
//!
//! Column order and names are a public contract with spreadsheet users.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::io::Write;
use thiserror::Error;

use crate::scanner::ScanRecord;

/// Export header, in column order.
pub const CSV_HEADER: [&str; 15] = [
    "Symbol",
    "LTP",
    "Prev Close",
    "Change%",
    "ATR",
    "ATR%",
    "Volume",
    "Avg Volume",
    "Vol Ratio",
    "R-Factor",
    "K-Factor",
    "Signal",
    "Direction",
    "Recommendation",
    "Timestamp",
];

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

fn row(record: &ScanRecord) -> [String; 15] {
    [
        record.symbol.clone(),
        record.ltp.to_string(),
        record.prev_close.to_string(),
        record.change_pct.to_string(),
        record.atr.to_string(),
        record.atr_pct.to_string(),
        record.volume.to_string(),
        record.avg_volume.to_string(),
        record.vol_ratio.to_string(),
        record.r_factor.to_string(),
        record.k_factor.to_string(),
        record.signal.to_string(),
        record.direction.to_string(),
        record.recommendation.clone(),
        record.timestamp.clone(),
    ]
}

/// Write records as CSV (header first) to any writer.
pub fn write_csv<W: Write>(records: &[ScanRecord], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(CSV_HEADER)?;
    for record in records {
        csv_writer.write_record(row(record))?;
    }
    csv_writer.flush()?;

    Ok(())
}

/// Render records as a CSV string.
pub fn to_csv_string(records: &[ScanRecord]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// File name for an export taken at `now`: `rfactor_live_YYYYmmdd_HHMMSS.csv`.
pub fn export_file_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("rfactor_live_{}.csv", now.format("%Y%m%d_%H%M%S"))
}
