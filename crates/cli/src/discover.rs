//! Finding the EKJ journals and the OLD exports that belong to a day.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDate;
use glob::{MatchOptions, Pattern};

use crate::exit_codes::EXIT_USAGE;
use crate::settings::DiscoverySettings;
use crate::CliError;

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

fn discovery_err(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_USAGE, message: msg.into(), hint: None }
}

/// Every EKJ journal under `dir`, recursively, sorted by path.
pub fn all_ekj(dir: &Path, discovery: &DiscoverySettings) -> Result<Vec<PathBuf>, CliError> {
    let pattern = format!(
        "{}/**/*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(&discovery.ekj_extension)
    );
    let entries = glob::glob_with(&pattern, CASE_INSENSITIVE)
        .map_err(|e| discovery_err(format!("bad EKJ search pattern '{pattern}': {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("skipping unreadable path: {e}"),
        }
    }
    files.sort();
    Ok(files)
}

/// The most recently modified EKJ journal under `dir`.
pub fn latest_ekj(dir: &Path, discovery: &DiscoverySettings) -> Result<Option<PathBuf>, CliError> {
    let latest = all_ekj(dir, discovery)?
        .into_iter()
        .map(|path| {
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .max()
        .map(|(_, path)| path);
    Ok(latest)
}

/// OLD sales exports of `report_date` directly inside `dir`, sorted by name.
///
/// A file qualifies when its name matches `old_pattern`, does not match
/// `old_exclude_pattern`, and contains `d<YYYYMMDD>` of the report date.
pub fn old_files(
    dir: &Path,
    report_date: NaiveDate,
    discovery: &DiscoverySettings,
) -> Result<Vec<PathBuf>, CliError> {
    let include = Pattern::new(&discovery.old_pattern)
        .map_err(|e| discovery_err(format!("bad OLD pattern: {e}")))?;
    let exclude = Pattern::new(&discovery.old_exclude_pattern)
        .map_err(|e| discovery_err(format!("bad OLD exclude pattern: {e}")))?;
    let day_tag = format!("d{}", report_date.format("%Y%m%d"));

    let entries = std::fs::read_dir(dir)
        .map_err(|e| discovery_err(format!("cannot list OLD directory {}: {e}", dir.display())))?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if include.matches_with(&name, CASE_INSENSITIVE)
            && !exclude.matches_with(&name, CASE_INSENSITIVE)
            && name.contains(&day_tag)
        {
            files.push(path);
        }
    }
    files.sort();
    log::debug!("{} OLD file(s) for {report_date} in {}", files.len(), dir.display());
    Ok(files)
}
