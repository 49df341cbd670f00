use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::amount::NumberFormat;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the engine needs to know about the local environment: field
/// labels, separators, date formats and the monetary tolerance.
///
/// Passed by reference into each component constructor; nothing is read from
/// process-wide state, so several locales can be exercised in one process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub tolerance: ToleranceConfig,
    pub ekj: EkjConfig,
    pub old: OldConfig,
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToleranceConfig {
    /// Largest absolute difference, in cents, still treated as equal.
    pub amount_cents: i64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self { amount_cents: 1 }
    }
}

// ---------------------------------------------------------------------------
// EKJ (register Z report)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EkjConfig {
    pub labels: EkjLabels,
    pub number: NumberFormat,
    /// chrono format of the report date token.
    pub date_format: String,
    /// Lines after the Z number line that still belong to the Z block.
    pub z_block_max_lines: usize,
    /// Leading `/`-separated segments of a receipt header token that form
    /// the receipt id (`12/950/1` → `12/950` with 2).
    pub receipt_id_segments: usize,
}

impl Default for EkjConfig {
    fn default() -> Self {
        Self {
            labels: EkjLabels::default(),
            number: NumberFormat::comma(),
            date_format: "%Y-%m-%d".into(),
            z_block_max_lines: 500,
            receipt_id_segments: 2,
        }
    }
}

/// Line labels, matched case- and diacritic-insensitively. Each field lists
/// alternatives; the first one found wins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EkjLabels {
    /// Found anywhere in a line; opens the Z block.
    pub z_number: Vec<String>,
    /// Found anywhere in a line; the first date token after it is used.
    pub report_date: Vec<String>,
    /// Line prefix of the declared day total.
    pub day_total: Vec<String>,
    /// Line prefix of the declared fiscal receipt count.
    pub receipt_count: Vec<String>,
    /// Line prefix opening one receipt in the journal.
    pub receipt_header: Vec<String>,
    /// Line prefix of a receipt payment line; the last one wins.
    pub receipt_total: Vec<String>,
}

impl Default for EkjLabels {
    fn default() -> Self {
        fn labels(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            z_number: labels(&["Z ataskaitos numeris", "Z numeris"]),
            report_date: labels(&["Ataskaitos pabaig"]),
            day_total: labels(&["Dienos pardavimai"]),
            receipt_count: labels(&["Fiskalinių kvitų skaičius"]),
            receipt_header: labels(&["Kvito Nr."]),
            receipt_total: labels(&["Mok"]),
        }
    }
}

// ---------------------------------------------------------------------------
// OLD (sales export)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OldConfig {
    pub tags: OldTags,
    pub number: NumberFormat,
    /// chrono formats tried in order on the record date.
    pub date_formats: Vec<String>,
    /// Fail with `NoMatchingRecords` instead of reconciling against an
    /// empty OLD side.
    pub require_match: bool,
}

impl Default for OldConfig {
    fn default() -> Self {
        Self {
            tags: OldTags::default(),
            number: NumberFormat::dot(),
            date_formats: vec!["%Y.%m.%d".into(), "%Y-%m-%d".into()],
            require_match: false,
        }
    }
}

/// Element names of one OLD record and its fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OldTags {
    pub record: String,
    pub doc_number: String,
    pub amount: String,
    pub date: String,
}

impl Default for OldTags {
    fn default() -> Self {
        Self {
            record: "I06".into(),
            doc_number: "I06_DOK_NR".into(),
            amount: "I06_MOK_SUMA".into(),
            date: "I06_OP_DATA".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance.amount_cents < 0 {
            return Err(ConfigError::Validation(format!(
                "tolerance.amount_cents must not be negative, got {}",
                self.tolerance.amount_cents
            )));
        }

        validate_number_format("ekj.number", &self.ekj.number)?;
        validate_number_format("old.number", &self.old.number)?;

        let labels = &self.ekj.labels;
        for (name, values) in [
            ("z_number", &labels.z_number),
            ("report_date", &labels.report_date),
            ("day_total", &labels.day_total),
            ("receipt_count", &labels.receipt_count),
            ("receipt_header", &labels.receipt_header),
            ("receipt_total", &labels.receipt_total),
        ] {
            if values.is_empty() || values.iter().any(|v| v.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "ekj.labels.{name} needs at least one non-empty label"
                )));
            }
        }

        if self.ekj.z_block_max_lines == 0 {
            return Err(ConfigError::Validation(
                "ekj.z_block_max_lines must be at least 1".into(),
            ));
        }
        if self.ekj.receipt_id_segments == 0 {
            return Err(ConfigError::Validation(
                "ekj.receipt_id_segments must be at least 1".into(),
            ));
        }

        validate_date_format("ekj.date_format", &self.ekj.date_format)?;
        if self.old.date_formats.is_empty() {
            return Err(ConfigError::Validation(
                "old.date_formats needs at least one format".into(),
            ));
        }
        for format in &self.old.date_formats {
            validate_date_format("old.date_formats", format)?;
        }

        let tags = &self.old.tags;
        for (name, value) in [
            ("record", &tags.record),
            ("doc_number", &tags.doc_number),
            ("amount", &tags.amount),
            ("date", &tags.date),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "old.tags.{name} must not be empty"
                )));
            }
        }

        Ok(())
    }
}

fn validate_number_format(section: &str, format: &NumberFormat) -> Result<(), ConfigError> {
    if format.decimal_separator.is_ascii_digit() || format.decimal_separator == '-' {
        return Err(ConfigError::Validation(format!(
            "{section}: invalid decimal separator '{}'",
            format.decimal_separator
        )));
    }
    if let Some(sep) = format.thousands_separator {
        if sep == format.decimal_separator || sep.is_ascii_digit() || sep == '-' {
            return Err(ConfigError::Validation(format!(
                "{section}: invalid thousands separator '{sep}'"
            )));
        }
    }
    Ok(())
}

fn validate_date_format(field: &str, format: &str) -> Result<(), ConfigError> {
    if format.trim().is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::Validation(format!(
            "{field}: invalid date format '{format}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config, ReconConfig::default());
        assert_eq!(config.tolerance.amount_cents, 1);
        assert_eq!(config.ekj.number.decimal_separator, ',');
        assert_eq!(config.old.number.decimal_separator, '.');
        assert_eq!(config.old.tags.record, "I06");
        assert!(!config.old.require_match);
    }

    #[test]
    fn parse_partial_overrides() {
        let input = r#"
[tolerance]
amount_cents = 0

[ekj]
date_format = "%d.%m.%Y"

[ekj.labels]
day_total = ["Dienos apyvarta", "Dienos pardavimai"]

[ekj.number]
decimal_separator = "."
thousands_separator = ","

[old]
require_match = true
date_formats = ["%d/%m/%Y"]

[old.tags]
record = "ROW"
"#;
        let config = ReconConfig::from_toml(input).unwrap();
        assert_eq!(config.tolerance.amount_cents, 0);
        assert_eq!(config.ekj.date_format, "%d.%m.%Y");
        assert_eq!(config.ekj.labels.day_total.len(), 2);
        // Untouched labels keep their defaults
        assert_eq!(config.ekj.labels.receipt_header, vec!["Kvito Nr."]);
        assert_eq!(config.ekj.number.thousands_separator, Some(','));
        assert!(config.old.require_match);
        assert_eq!(config.old.tags.record, "ROW");
        assert_eq!(config.old.tags.doc_number, "I06_DOK_NR");
    }

    #[test]
    fn reject_negative_tolerance() {
        let err = ReconConfig::from_toml("[tolerance]\namount_cents = -1\n").unwrap_err();
        assert!(err.to_string().contains("must not be negative"));
    }

    #[test]
    fn reject_clashing_separators() {
        let input = r#"
[ekj.number]
decimal_separator = ","
thousands_separator = ","
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("ekj.number"));
    }

    #[test]
    fn reject_empty_label() {
        let input = r#"
[ekj.labels]
z_number = []
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("z_number"));
    }

    #[test]
    fn reject_bad_date_format() {
        let input = r#"
[old]
date_formats = ["%Y-%Q"]
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn reject_unknown_key() {
        let err = ReconConfig::from_toml("[tolerance]\namount = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
