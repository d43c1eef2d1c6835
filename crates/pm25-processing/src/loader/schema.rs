//! Explicit column schema, resolved once per source.

use crate::error::{PipelineError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-]+").expect("Invalid regex: header separators"));

/// Normalize a header for alias matching: trimmed, lower-case, with runs of
/// whitespace and hyphens collapsed to `_`.
pub fn normalize_header(header: &str) -> String {
    let trimmed = header.trim().trim_start_matches('\u{feff}').to_lowercase();
    SEPARATORS.replace_all(&trimmed, "_").into_owned()
}

/// Logical fields of a [`Record`](crate::types::Record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Country,
    Year,
    UrbanPopulation,
    Pm25,
    Region,
    Settlement,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Country,
        Field::Year,
        Field::UrbanPopulation,
        Field::Pm25,
        Field::Region,
        Field::Settlement,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Year => "year",
            Self::UrbanPopulation => "urban_population",
            Self::Pm25 => "pm25",
            Self::Region => "region",
            Self::Settlement => "settlement",
        }
    }

    /// Accepted headers after [`normalize_header`], in priority order.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Country => &["country", "location", "country_name"],
            Self::Year => &["year", "period"],
            Self::UrbanPopulation => &["urban_population", "urban_pop", "population"],
            Self::Pm25 => &["pm25", "pm2.5", "pm25_value", "factvaluenumeric", "value"],
            Self::Region => &["region", "parentlocation"],
            Self::Settlement => &["settlement", "dim1"],
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, Self::Region | Self::Settlement)
    }
}

/// Source column names backing each logical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub country: String,
    pub year: String,
    pub urban_population: String,
    pub pm25: String,
    pub region: Option<String>,
    pub settlement: Option<String>,
}

fn find_column(headers: &[String], field: Field) -> Option<String> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    field.aliases().iter().find_map(|alias| {
        normalized
            .iter()
            .position(|h| h == alias)
            .map(|idx| headers[idx].clone())
    })
}

impl ColumnSchema {
    /// Match `headers` against the field aliases.
    ///
    /// Fails with [`PipelineError::Schema`] naming every missing required
    /// field and the headers that were available.
    pub fn resolve(headers: &[String]) -> Result<Self> {
        let missing: Vec<&str> = Field::ALL
            .iter()
            .filter(|f| f.is_required() && find_column(headers, **f).is_none())
            .map(|f| f.name())
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::Schema(format!(
                "missing required column(s) [{}]; available: [{}]",
                missing.join(", "),
                headers.join(", ")
            )));
        }

        let required = |field: Field| find_column(headers, field).unwrap_or_default();
        Ok(Self {
            country: required(Field::Country),
            year: required(Field::Year),
            urban_population: required(Field::UrbanPopulation),
            pm25: required(Field::Pm25),
            region: find_column(headers, Field::Region),
            settlement: find_column(headers, Field::Settlement),
        })
    }

    /// Source column for `field`, if the source has one.
    pub fn column(&self, field: Field) -> Option<&str> {
        match field {
            Field::Country => Some(&self.country),
            Field::Year => Some(&self.year),
            Field::UrbanPopulation => Some(&self.urban_population),
            Field::Pm25 => Some(&self.pm25),
            Field::Region => self.region.as_deref(),
            Field::Settlement => self.settlement.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Urban Population "), "urban_population");
        assert_eq!(normalize_header("\u{feff}Country"), "country");
        assert_eq!(normalize_header("PM2.5"), "pm2.5");
        assert_eq!(normalize_header("urban-pop"), "urban_pop");
    }

    #[test]
    fn test_resolve_tidy_headers() {
        let schema =
            ColumnSchema::resolve(&headers(&["country", "year", "urban_population", "pm25"]))
                .unwrap();
        assert_eq!(schema.pm25, "pm25");
        assert_eq!(schema.region, None);
    }

    #[test]
    fn test_resolve_who_headers() {
        let schema = ColumnSchema::resolve(&headers(&[
            "ParentLocation",
            "Location",
            "Period",
            "Dim1",
            "Population",
            "FactValueNumeric",
        ]))
        .unwrap();
        assert_eq!(schema.country, "Location");
        assert_eq!(schema.year, "Period");
        assert_eq!(schema.pm25, "FactValueNumeric");
        assert_eq!(schema.region.as_deref(), Some("ParentLocation"));
        assert_eq!(schema.settlement.as_deref(), Some("Dim1"));
    }

    #[test]
    fn test_resolve_reports_all_missing_fields() {
        let err = ColumnSchema::resolve(&headers(&["country", "value"])).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
        let message = err.to_string();
        assert!(message.contains("year"));
        assert!(message.contains("urban_population"));
        assert!(!message.contains("pm25,"));
    }
}
