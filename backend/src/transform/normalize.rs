//! Field-level normalization: detraction percentages and invoice suffix keys.
//!
//! Percentages never abort a row. [`parse_percentage`] reports why a value
//! was rejected and [`normalize_percentage`] turns every rejection into `0.0`,
//! i.e. "no detraction".
//!
//! Suffix keys do not default: an identifier with no textual form yields
//! `None`, which downstream deduplication and sorting carry explicitly.

use thiserror::Error;

use crate::models::CellValue;

/// Decimal places kept after normalization.
pub const PERCENTAGE_DECIMALS: i32 = 4;

/// Length of the invoice suffix key.
pub const SUFFIX_LEN: usize = 6;

/// Why a percentage cell could not be read.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PercentageError {
    /// Cell is blank.
    #[error("percentage is missing")]
    Missing,

    /// Text that is not a number once `%` and spaces are removed.
    #[error("'{0}' is not a number")]
    NotNumeric(String),

    /// NaN or infinite.
    #[error("percentage is not finite")]
    NotFinite,

    /// Cell type that carries no percentage (dates).
    #[error("unsupported cell type for a percentage")]
    Unsupported,
}

/// Parse a percentage cell into a fraction.
///
/// - text: whitespace and `%` signs are removed before parsing (`"95 %"` → `0.95`)
/// - numbers above `1` are whole-number percentages and are divided by 100
///   (`95` → `0.95`, `150` → `1.5`; out-of-range results are not clamped)
/// - numbers in `[0, 1]` are already fractions
/// - the result is rounded to [`PERCENTAGE_DECIMALS`] places
pub fn parse_percentage(value: &CellValue) -> Result<f64, PercentageError> {
    let raw = match value {
        CellValue::Empty => return Err(PercentageError::Missing),
        CellValue::Int(i) => *i as f64,
        CellValue::Float(f) => *f,
        CellValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        CellValue::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| *c != '%' && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return Err(PercentageError::Missing);
            }
            cleaned
                .parse::<f64>()
                .map_err(|_| PercentageError::NotNumeric(s.clone()))?
        }
        CellValue::DateTime(_) => return Err(PercentageError::Unsupported),
    };

    if !raw.is_finite() {
        return Err(PercentageError::NotFinite);
    }

    let fraction = if raw > 1.0 { raw / 100.0 } else { raw };
    Ok(round_to(fraction, PERCENTAGE_DECIMALS))
}

/// Normalize a percentage cell, defaulting to `0.0` on any [`PercentageError`].
pub fn normalize_percentage(value: &CellValue) -> f64 {
    parse_percentage(value).unwrap_or(0.0)
}

/// Last [`SUFFIX_LEN`] characters of the identifier's textual form.
///
/// Shorter identifiers are returned whole. Blank cells have no textual form
/// and yield `None`.
pub fn invoice_suffix(value: &CellValue) -> Option<String> {
    let text = value.text()?;
    let len = text.chars().count();
    Some(text.chars().skip(len.saturating_sub(SUFFIX_LEN)).collect())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_null() {
        assert_eq!(normalize_percentage(&CellValue::Empty), 0.0);
    }

    #[test]
    fn test_normalize_percent_text() {
        assert_eq!(normalize_percentage(&CellValue::from("95%")), 0.95);
        assert_eq!(normalize_percentage(&CellValue::from(" 100 % ")), 1.0);
        assert_eq!(normalize_percentage(&CellValue::from("87.9%")), 0.879);
    }

    #[test]
    fn test_normalize_fraction_passthrough() {
        assert_eq!(normalize_percentage(&CellValue::Float(0.4)), 0.4);
        assert_eq!(normalize_percentage(&CellValue::Float(1.0)), 1.0);
    }

    #[test]
    fn test_normalize_whole_number_percent() {
        assert_eq!(normalize_percentage(&CellValue::Int(95)), 0.95);
        assert_eq!(normalize_percentage(&CellValue::from("95")), 0.95);
    }

    #[test]
    fn test_normalize_out_of_range_is_not_clamped() {
        assert_eq!(normalize_percentage(&CellValue::Int(150)), 1.5);
    }

    #[test]
    fn test_normalize_garbage_defaults_to_zero() {
        assert_eq!(normalize_percentage(&CellValue::from("abc")), 0.0);
        assert_eq!(normalize_percentage(&CellValue::from("%")), 0.0);
        assert_eq!(normalize_percentage(&CellValue::from("nan")), 0.0);
        assert_eq!(normalize_percentage(&CellValue::Float(f64::NAN)), 0.0);
    }

    #[test]
    fn test_parse_reports_failure_kind() {
        assert_eq!(parse_percentage(&CellValue::Empty), Err(PercentageError::Missing));
        assert_eq!(
            parse_percentage(&CellValue::from("abc")),
            Err(PercentageError::NotNumeric("abc".into()))
        );
        assert_eq!(parse_percentage(&CellValue::from("inf")), Err(PercentageError::NotFinite));
    }

    #[test]
    fn test_rounding_to_four_places() {
        assert_eq!(normalize_percentage(&CellValue::Float(0.123456)), 0.1235);
        assert_eq!(normalize_percentage(&CellValue::from("12.34567%")), 0.1235);
    }

    #[test]
    fn test_suffix_long_identifier() {
        assert_eq!(invoice_suffix(&CellValue::Int(123456789)).as_deref(), Some("456789"));
        assert_eq!(invoice_suffix(&CellValue::Float(123456789.0)).as_deref(), Some("456789"));
        assert_eq!(invoice_suffix(&CellValue::from("F001-000777")).as_deref(), Some("000777"));
    }

    #[test]
    fn test_suffix_short_identifier() {
        assert_eq!(invoice_suffix(&CellValue::Int(42)).as_deref(), Some("42"));
    }

    #[test]
    fn test_suffix_counts_characters_not_bytes() {
        assert_eq!(invoice_suffix(&CellValue::from("ÑÑÑÑÑÑÑ1")).as_deref(), Some("ÑÑÑÑÑ1"));
    }

    #[test]
    fn test_suffix_missing_identifier() {
        assert_eq!(invoice_suffix(&CellValue::Empty), None);
    }
}
