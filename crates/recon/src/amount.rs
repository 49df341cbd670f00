//! Monetary amounts as integer minor units (cents), parsed with explicit
//! locale separators.

use serde::Deserialize;

/// Decimal and thousands separators of one input format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NumberFormat {
    pub decimal_separator: char,
    /// Grouping separator. A whitespace separator accepts any whitespace
    /// (registers print both plain and no-break spaces).
    pub thousands_separator: Option<char>,
}

impl NumberFormat {
    /// `1 500,00`
    pub fn comma() -> Self {
        Self {
            decimal_separator: ',',
            thousands_separator: Some(' '),
        }
    }

    /// `1500.00`
    pub fn dot() -> Self {
        Self {
            decimal_separator: '.',
            thousands_separator: None,
        }
    }

    fn is_grouping(&self, ch: char) -> bool {
        match self.thousands_separator {
            Some(sep) if sep.is_whitespace() => ch.is_whitespace(),
            Some(sep) => ch == sep,
            None => false,
        }
    }

    fn is_amount_char(&self, ch: char) -> bool {
        ch.is_ascii_digit() || ch == '-' || ch == self.decimal_separator || self.is_grouping(ch)
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::dot()
    }
}

/// Largest absolute amount accepted by [`parse_cents`]: 10^13 currency
/// units. Sums of many such amounts still fit in `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000_000;

/// Parse an amount into cents.
///
/// Accepts an optional leading `-`, grouping separators inside the integer
/// part, and at most two significant fractional digits (extra trailing zeros
/// are tolerated). Returns `None` for anything else, including amounts
/// beyond [`MAX_AMOUNT_CENTS`].
pub fn parse_cents(raw: &str, format: &NumberFormat) -> Option<i64> {
    let s = raw.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };

    let mut int_digits = String::new();
    let mut frac_digits: Option<String> = None;

    for ch in body.chars() {
        if ch.is_ascii_digit() {
            match frac_digits.as_mut() {
                Some(frac) => frac.push(ch),
                None => int_digits.push(ch),
            }
        } else if ch == format.decimal_separator && frac_digits.is_none() {
            frac_digits = Some(String::new());
        } else if format.is_grouping(ch) && frac_digits.is_none() && !int_digits.is_empty() {
            continue;
        } else {
            return None;
        }
    }

    if int_digits.is_empty() {
        return None;
    }

    let frac_cents = match frac_digits {
        None => 0,
        Some(frac) if frac.is_empty() => return None,
        Some(frac) => {
            let (significant, rest) = frac.split_at(frac.len().min(2));
            if rest.chars().any(|c| c != '0') {
                return None;
            }
            let padded = format!("{significant:0<2}");
            padded.parse::<i64>().ok()?
        }
    };

    let cents = int_digits
        .parse::<i64>()
        .ok()?
        .checked_mul(100)?
        .checked_add(frac_cents)?;
    if cents > MAX_AMOUNT_CENTS {
        return None;
    }
    Some(if negative { -cents } else { cents })
}

/// The amount-looking tail of a line (`"Dienos pardavimai   1 500,00"` →
/// `"1 500,00"`), or `None` when the line does not end in a number.
pub fn trailing_amount<'a>(line: &'a str, format: &NumberFormat) -> Option<&'a str> {
    let trimmed = line.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, ch)| format.is_amount_char(*ch))
        .last()
        .map(|(idx, _)| idx)?;
    let candidate = trimmed[start..].trim_start();
    if candidate.chars().any(|c| c.is_ascii_digit()) {
        Some(candidate)
    } else {
        None
    }
}

/// Render cents as a plain decimal (`-1234` → `"-12.34"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_format_with_grouping() {
        let fmt = NumberFormat::comma();
        assert_eq!(parse_cents("1 500,00", &fmt), Some(150_000));
        assert_eq!(parse_cents("1\u{a0}500,00", &fmt), Some(150_000));
        assert_eq!(parse_cents("3,7", &fmt), Some(370));
        assert_eq!(parse_cents("-12,34", &fmt), Some(-1234));
        assert_eq!(parse_cents("42", &fmt), Some(4200));
    }

    #[test]
    fn dot_format() {
        let fmt = NumberFormat::dot();
        assert_eq!(parse_cents("700.00", &fmt), Some(70_000));
        assert_eq!(parse_cents(" 0.05 ", &fmt), Some(5));
        assert_eq!(parse_cents("10.010", &fmt), Some(1001));
        // Comma is not a separator here
        assert_eq!(parse_cents("1,500.00", &fmt), None);
    }

    #[test]
    fn rejects_garbage() {
        let fmt = NumberFormat::comma();
        assert_eq!(parse_cents("", &fmt), None);
        assert_eq!(parse_cents("abc", &fmt), None);
        assert_eq!(parse_cents("12,", &fmt), None);
        assert_eq!(parse_cents(",50", &fmt), None);
        assert_eq!(parse_cents("1,2,3", &fmt), None);
        assert_eq!(parse_cents("12,345", &fmt), None);
        assert_eq!(parse_cents("1-2", &fmt), None);
    }

    #[test]
    fn trailing_amount_picks_line_tail() {
        let fmt = NumberFormat::comma();
        assert_eq!(
            trailing_amount("Dienos pardavimai       1 500,00", &fmt),
            Some("1 500,00")
        );
        assert_eq!(trailing_amount("Moketi 3,70  ", &fmt), Some("3,70"));
        assert_eq!(trailing_amount("PVM 21% 12,00", &fmt), Some("12,00"));
        assert_eq!(trailing_amount("Moketi EUR", &fmt), None);
        assert_eq!(trailing_amount("", &fmt), None);
    }

    #[test]
    fn rejects_oversized_amounts() {
        let fmt = NumberFormat::dot();
        assert_eq!(parse_cents("50000000000000000.00", &fmt), None);
        assert_eq!(parse_cents("-50000000000000000.00", &fmt), None);
        assert_eq!(parse_cents("99999999999999999999999", &fmt), None);
        assert_eq!(parse_cents("10000000000000.00", &fmt), Some(MAX_AMOUNT_CENTS));
        assert_eq!(parse_cents("10000000000000.01", &fmt), None);
    }

    #[test]
    fn format_cents_signs() {
        assert_eq!(format_cents(150_000), "1500.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-1234), "-12.34");
        assert_eq!(format_cents(0), "0.00");
    }
}
