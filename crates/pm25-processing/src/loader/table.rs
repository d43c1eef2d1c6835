//! Format-independent view of a raw source table.

use crate::error::{PipelineError, Result};
use crate::utils::is_missing_marker;
use polars::prelude::*;
use serde_json::Value;
use std::collections::HashSet;

/// A raw table with every cell kept as optional text.
///
/// Both CSV and JSON sources are read into this shape so schema resolution
/// and row validation run once, on one representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    /// Column-major cells: `cells[column][row]`.
    cells: Vec<Vec<Option<String>>>,
    height: usize,
}

impl RawTable {
    /// Build a table from named columns of equal length.
    pub fn new(columns: Vec<(String, Vec<Option<String>>)>) -> Result<Self> {
        let height = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        if let Some((name, _)) = columns.iter().find(|(_, c)| c.len() != height) {
            return Err(PipelineError::Schema(format!(
                "column '{}' length differs from the rest of the table",
                name
            )));
        }
        let (columns, cells): (Vec<String>, Vec<Vec<Option<String>>>) =
            columns.into_iter().unzip();
        Ok(Self {
            columns,
            cells,
            height,
        })
    }

    /// Convert a DataFrame, casting every column to text.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series().cast(&DataType::String)?;
            let values: Vec<Option<String>> = series
                .str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect();
            columns.push((column.name().to_string(), values));
        }
        Self::new(columns)
    }

    /// Parse JSON records.
    ///
    /// Accepts a top-level array of objects, or an object wrapping that
    /// array under `value` (the WHO GHO OData shape), `data` or `records`.
    /// Columns keep the order in which their keys first appear.
    pub fn from_json_str(content: &str, source_name: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(content)
            .map_err(|e| PipelineError::load(source_name, format!("invalid JSON: {}", e)))?;

        let rows = match &root {
            Value::Array(rows) => rows,
            Value::Object(map) => ["value", "data", "records"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))
                .ok_or_else(|| {
                    PipelineError::load(source_name, "JSON object has no record array")
                })?,
            _ => {
                return Err(PipelineError::load(
                    source_name,
                    "expected a JSON array of records",
                ));
            }
        };

        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for (idx, row) in rows.iter().enumerate() {
            let object = row.as_object().ok_or_else(|| {
                PipelineError::load(source_name, format!("record {} is not an object", idx + 1))
            })?;
            for key in object.keys() {
                if seen.insert(key.as_str()) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values = rows
                    .iter()
                    .map(|row| row.get(&name).and_then(json_cell))
                    .collect();
                (name, values)
            })
            .collect();
        Self::new(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Cells of the column named `name`.
    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| self.cells[idx].as_slice())
    }

    /// Missing cells per column, in column order. Empty strings and
    /// missing markers count as missing.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .zip(&self.cells)
            .map(|(name, cells)| {
                let missing = cells
                    .iter()
                    .filter(|c| c.as_deref().is_none_or(is_missing_marker))
                    .count();
                (name.clone(), missing)
            })
            .collect()
    }

    /// Rows identical to an earlier row across every column.
    pub fn duplicate_rows(&self) -> usize {
        let mut seen: HashSet<Vec<Option<&str>>> = HashSet::with_capacity(self.height);
        (0..self.height)
            .filter(|&row| {
                let key: Vec<Option<&str>> =
                    self.cells.iter().map(|c| c[row].as_deref()).collect();
                !seen.insert(key)
            })
            .count()
    }
}

fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(|s| s.to_string())).collect()
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = RawTable::new(vec![
            ("a".to_string(), cells(&[Some("1"), Some("2")])),
            ("b".to_string(), cells(&[Some("1")])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_dataframe_casts_to_text() {
        let df = df![
            "country" => ["Chad", "Chad"],
            "year" => [2010i64, 2011],
            "pm25" => [Some(12.5), None],
        ]
        .unwrap();

        let table = RawTable::from_dataframe(&df).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.columns(), &["country", "year", "pm25"]);
        assert_eq!(table.column("year").unwrap()[1].as_deref(), Some("2011"));
        assert_eq!(table.column("pm25").unwrap()[1], None);
    }

    #[test]
    fn test_from_json_array() {
        let json = r#"[
            {"country": "Chad", "year": 2010, "pm25": 30.5},
            {"country": "Chad", "year": 2011, "pm25": null, "region": "Africa"}
        ]"#;
        let table = RawTable::from_json_str(json, "inline").unwrap();
        assert_eq!(table.columns(), &["country", "year", "pm25", "region"]);
        assert_eq!(table.column("pm25").unwrap()[0].as_deref(), Some("30.5"));
        assert_eq!(table.column("region").unwrap()[0], None);
    }

    #[test]
    fn test_from_json_odata_wrapper() {
        let json = r#"{"@odata.context": "x", "value": [{"Location": "Chad"}]}"#;
        let table = RawTable::from_json_str(json, "inline").unwrap();
        assert_eq!(table.height(), 1);
    }

    #[test]
    fn test_from_json_malformed_is_load_error() {
        let err = RawTable::from_json_str("{not json", "bad.json").unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");

        let err = RawTable::from_json_str("42", "bad.json").unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }

    #[test]
    fn test_missing_counts_and_duplicates() {
        let table = RawTable::new(vec![
            ("a".to_string(), cells(&[Some("1"), Some("1"), None])),
            ("b".to_string(), cells(&[Some("x"), Some("x"), Some("NA")])),
        ])
        .unwrap();

        assert_eq!(
            table.missing_counts(),
            vec![("a".to_string(), 1), ("b".to_string(), 1)]
        );
        assert_eq!(table.duplicate_rows(), 1);
    }
}
