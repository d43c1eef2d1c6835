//! Shared parsing helpers for raw cell values.

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters used as thousands separators or padding in numeric cells.
pub const NUMERIC_FORMAT_CHARS: [char; 3] = [',', ' ', '_'];

/// Cell contents that mean "no value".
pub const MISSING_MARKERS: [&str; 9] = [
    "", "na", "n/a", "nan", "null", "none", "missing", "-", "#n/a",
];

/// Strip formatting characters so a numeric cell can be parsed.
///
/// ```rust,ignore
/// assert_eq!(clean_numeric_string(" 1,234.5 "), "1234.5");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !NUMERIC_FORMAT_CHARS.contains(c))
        .collect()
}

/// Check if a cell is empty or one of the [`MISSING_MARKERS`].
pub fn is_missing_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    MISSING_MARKERS.iter().any(|&marker| lower == marker)
}

/// Outcome of parsing one raw cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedCell<T> {
    Missing,
    Value(T),
    Invalid,
}

/// Parse a numeric cell, distinguishing absent from malformed.
pub fn parse_numeric_cell(cell: Option<&str>) -> ParsedCell<f64> {
    match cell {
        None => ParsedCell::Missing,
        Some(s) if is_missing_marker(s) => ParsedCell::Missing,
        Some(s) => match clean_numeric_string(s).parse::<f64>() {
            Ok(v) if v.is_finite() => ParsedCell::Value(v),
            _ => ParsedCell::Invalid,
        },
    }
}

/// Parse a year cell. Accepts integral floats ("2010.0") as written by
/// spreadsheet exports.
pub fn parse_year_cell(cell: Option<&str>) -> ParsedCell<i32> {
    match parse_numeric_cell(cell) {
        ParsedCell::Value(v) if v.fract() == 0.0 && (0.0..=9999.0).contains(&v) => {
            ParsedCell::Value(v as i32)
        }
        ParsedCell::Missing => ParsedCell::Missing,
        _ => ParsedCell::Invalid,
    }
}

/// Trimmed text cell, with missing markers mapped to `None`.
pub fn parse_text_cell(cell: Option<&str>) -> Option<String> {
    cell.filter(|s| !is_missing_marker(s))
        .map(|s| s.trim().to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string(" 1,234.5 "), "1234.5");
        assert_eq!(clean_numeric_string("1 000"), "1000");
    }

    #[test]
    fn test_is_missing_marker() {
        assert!(is_missing_marker(""));
        assert!(is_missing_marker("  N/A "));
        assert!(is_missing_marker("NaN"));
        assert!(!is_missing_marker("0"));
        assert!(!is_missing_marker("Chad"));
    }

    #[test]
    fn test_parse_numeric_cell() {
        assert_eq!(parse_numeric_cell(Some("12.5")), ParsedCell::Value(12.5));
        assert_eq!(parse_numeric_cell(Some("1,200")), ParsedCell::Value(1200.0));
        assert_eq!(parse_numeric_cell(Some("NA")), ParsedCell::Missing);
        assert_eq!(parse_numeric_cell(None), ParsedCell::Missing);
        assert_eq!(parse_numeric_cell(Some("twelve")), ParsedCell::Invalid);
        assert_eq!(parse_numeric_cell(Some("inf")), ParsedCell::Invalid);
    }

    #[test]
    fn test_parse_year_cell() {
        assert_eq!(parse_year_cell(Some("2010")), ParsedCell::Value(2010));
        assert_eq!(parse_year_cell(Some("2010.0")), ParsedCell::Value(2010));
        assert_eq!(parse_year_cell(Some("2010.5")), ParsedCell::Invalid);
        assert_eq!(parse_year_cell(Some("")), ParsedCell::Missing);
    }

    #[test]
    fn test_parse_text_cell() {
        assert_eq!(parse_text_cell(Some("  Chad ")), Some("Chad".to_string()));
        assert_eq!(parse_text_cell(Some("n/a")), None);
        assert_eq!(parse_text_cell(None), None);
    }
}
