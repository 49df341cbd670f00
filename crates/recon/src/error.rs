use chrono::NaiveDate;
use thiserror::Error;

/// The EKJ text is structurally unusable. No partial `ZReport` is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No Z report block (Z number followed by a day sales figure) in the text.
    #[error("no Z report block found (expected a Z number and a day sales line)")]
    MissingZBlock,
    /// A labeled monetary field is present but its value cannot be parsed.
    #[error("line {line}: cannot parse amount '{value}'")]
    MalformedAmount { line: usize, value: String },
    /// The Z block carries no usable fiscal receipt count.
    #[error("Z report block has no fiscal receipt count")]
    MissingCountField,
    /// The Z block carries no report date.
    #[error("Z report block has no report date")]
    MissingReportDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Raised only when the caller requires at least one matching record.
    #[error("no OLD records match Z {z_number} on {report_date}")]
    NoMatchingRecords { z_number: u32, report_date: NaiveDate },
    /// The record markup of an OLD export cannot be read.
    #[error("malformed OLD export: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Semantically invalid value (empty label, clashing separators, ...).
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Failure of one end-to-end run (one EKJ file against its OLD exports).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}
