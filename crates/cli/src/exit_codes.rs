//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: schedulers and scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Every processed day reconciled OK                        |
//! | 1    | At least one day has mismatches                          |
//! | 2    | Usage or I/O error (bad args, missing file, no OLD files)|
//! | 3    | EKJ report could not be parsed                           |
//! | 4    | OLD export could not be read or had no matching records  |
//! | 5    | Invalid settings file                                    |
//! | 6    | Report written but the report mail could not be sent     |
//!
//! When several EKJ files are processed with `--all`, an error code from
//! any file wins over a mail failure, and a mail failure wins over a
//! mismatch; among errors the first file in input order decides.
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use kasa_recon::RunError;

/// Success - every day reconciled without anomalies.
pub const EXIT_SUCCESS: u8 = 0;

/// Reconciliation found differences.
/// Like `diff(1)`, exit 1 means "sources differ."
pub const EXIT_MISMATCH: u8 = 1;

/// Usage error - bad arguments, unreadable input, nothing to reconcile.
pub const EXIT_USAGE: u8 = 2;

/// EKJ parse error (no Z block, malformed amount, missing field).
pub const EXIT_EKJ_PARSE: u8 = 3;

/// OLD export error (unreadable markup, no records for the Z report).
pub const EXIT_OLD_EXTRACT: u8 = 4;

/// Settings file failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 5;

/// The report was written but mailing it failed (SMTP refused, unreachable).
pub const EXIT_MAIL: u8 = 6;

/// Map an engine run error to its exit code.
pub fn run_error_exit_code(err: &RunError) -> u8 {
    match err {
        RunError::Parse(_) => EXIT_EKJ_PARSE,
        RunError::Extract(_) => EXIT_OLD_EXTRACT,
    }
}
