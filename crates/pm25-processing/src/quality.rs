//! Data quality reporting.
//!
//! Describes the source table (missing cells per column, duplicate rows)
//! and compares it with the cleaned dataset.

use crate::loader::{LoadReport, RawTable};
use crate::outliers::IqrDetector;
use crate::types::Dataset;
use crate::utils::{ParsedCell, parse_numeric_cell};
use serde::{Deserialize, Serialize};

/// Missing cells in one source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub column: String,
    pub missing: usize,
    pub percentage: f64,
}

/// One row of the before/after comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningMetric {
    pub metric: String,
    pub before: usize,
    pub after: usize,
}

impl CleaningMetric {
    fn new(metric: &str, before: usize, after: usize) -> Self {
        Self {
            metric: metric.to_string(),
            before,
            after,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub source_rows: usize,
    /// Columns with at least one missing cell, most missing first.
    pub missing_by_column: Vec<ColumnMissing>,
    /// Rows identical to an earlier row in every column.
    pub duplicate_rows: usize,
    pub duplicate_keys_dropped: usize,
    pub negative_pm25: usize,
    pub cleaning_summary: Vec<CleaningMetric>,
}

pub struct QualityAnalyzer;

impl QualityAnalyzer {
    /// Build the quality report of a run.
    ///
    /// `output_columns` is the width of the featured artifact, the last
    /// per-record table a run writes. Outliers
    /// "before" are the source's pm25 values outside the global IQR fences;
    /// "after" are records carrying any flag from grouped detection.
    pub fn analyze(
        table: &RawTable,
        load: &LoadReport,
        dataset: &Dataset,
        iqr_multiplier: f64,
        output_columns: usize,
    ) -> QualityReport {
        let raw_pm25 = Self::raw_pm25_values(table, load);
        let outliers_before = IqrDetector::new(iqr_multiplier)
            .bounds(&raw_pm25)
            .map(|bounds| raw_pm25.iter().filter(|&&v| !bounds.contains(v)).count())
            .unwrap_or(0);
        let outliers_after = dataset
            .records
            .iter()
            .filter(|r| !r.outliers.is_normal())
            .count();
        let missing_before = table
            .column(&load.schema.pm25)
            .map(|cells| {
                cells
                    .iter()
                    .filter(|c| matches!(parse_numeric_cell(c.as_deref()), ParsedCell::Missing))
                    .count()
            })
            .unwrap_or(0)
            + load.negative_pm25;
        let missing_after = dataset.records.iter().filter(|r| r.pm25.is_none()).count();

        QualityReport {
            source_rows: table.height(),
            missing_by_column: Self::missing_by_column(table),
            duplicate_rows: table.duplicate_rows(),
            duplicate_keys_dropped: load.duplicate_keys_dropped,
            negative_pm25: load.negative_pm25,
            cleaning_summary: vec![
                CleaningMetric::new("Total Rows", table.height(), dataset.len()),
                CleaningMetric::new("Total Columns", table.width(), output_columns),
                CleaningMetric::new("Missing PM2.5", missing_before, missing_after),
                CleaningMetric::new("Total Outliers", outliers_before, outliers_after),
            ],
        }
    }

    /// Columns with missing cells, sorted by count descending then name.
    pub fn missing_by_column(table: &RawTable) -> Vec<ColumnMissing> {
        let height = table.height();
        let mut missing: Vec<ColumnMissing> = table
            .missing_counts()
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(column, count)| ColumnMissing {
                column,
                missing: count,
                percentage: if height > 0 {
                    count as f64 / height as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();
        missing.sort_by(|a, b| b.missing.cmp(&a.missing).then_with(|| a.column.cmp(&b.column)));
        missing
    }

    fn raw_pm25_values(table: &RawTable, load: &LoadReport) -> Vec<f64> {
        table
            .column(&load.schema.pm25)
            .map(|cells| {
                cells
                    .iter()
                    .filter_map(|c| match parse_numeric_cell(c.as_deref()) {
                        ParsedCell::Value(v) if v >= 0.0 => Some(v),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
