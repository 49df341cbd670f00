use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Case- and diacritic-insensitive form of a report line, used for label
/// matching: `"Fiskalinių kvitų skaičius"` → `"fiskaliniu kvitu skaicius"`.
///
/// Digits and separators pass through, so values can be read from the
/// folded line directly.
pub fn fold_label(input: &str) -> String {
    input
        .trim()
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Canonical receipt id. Both sides of a reconciliation go through this one
/// function before any comparison.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}
