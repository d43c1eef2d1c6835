//! DataFrame assembly for the tabular artifacts.

use crate::error::Result;
use crate::features::RegionalAggregate;
use crate::loader::RawTable;
use crate::types::{Dataset, OutlierKind, Record, SummaryStat};
use polars::prelude::*;

/// Columns of the cleaned artifact, in order.
pub const CLEANED_COLUMNS: [&str; 10] = [
    "country",
    "year",
    "region",
    "settlement",
    "urban_population",
    "pm25",
    "urban_population_missing",
    "pm25_missing",
    "urban_population_status",
    "pm25_status",
];

/// Columns the featured artifact adds to [`CLEANED_COLUMNS`].
pub const FEATURE_COLUMNS: [&str; 10] = [
    "outlier_label",
    "iqr_outlier",
    "zscore_outlier",
    "residual_outlier",
    "iqr_score",
    "zscore_score",
    "residual_score",
    "group",
    "deviation_from_group_mean",
    "year_over_year_change",
];

fn text<F>(records: &[Record], f: F) -> Vec<Option<String>>
where
    F: Fn(&Record) -> Option<String>,
{
    records.iter().map(f).collect()
}

fn numbers<F>(records: &[Record], f: F) -> Vec<Option<f64>>
where
    F: Fn(&Record) -> Option<f64>,
{
    records.iter().map(f).collect()
}

fn flags<F>(records: &[Record], f: F) -> Vec<bool>
where
    F: Fn(&Record) -> bool,
{
    records.iter().map(f).collect()
}

/// The source table exactly as read, every column as text.
pub fn raw_frame(table: &RawTable) -> Result<DataFrame> {
    let columns: Vec<Column> = table
        .columns()
        .iter()
        .filter_map(|name| {
            table
                .column(name)
                .map(|cells| Column::new(name.as_str().into(), cells.to_vec()))
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn cleaned_columns(records: &[Record]) -> Vec<Column> {
    let years: Vec<i32> = records.iter().map(|r| r.year).collect();
    vec![
        Column::new(CLEANED_COLUMNS[0].into(), text(records, |r| Some(r.country.clone()))),
        Column::new(CLEANED_COLUMNS[1].into(), years),
        Column::new(CLEANED_COLUMNS[2].into(), text(records, |r| r.region.clone())),
        Column::new(CLEANED_COLUMNS[3].into(), text(records, |r| r.settlement.clone())),
        Column::new(CLEANED_COLUMNS[4].into(), numbers(records, |r| r.urban_population)),
        Column::new(CLEANED_COLUMNS[5].into(), numbers(records, |r| r.pm25)),
        Column::new(
            CLEANED_COLUMNS[6].into(),
            flags(records, |r| r.missing.urban_population),
        ),
        Column::new(CLEANED_COLUMNS[7].into(), flags(records, |r| r.missing.pm25)),
        Column::new(
            CLEANED_COLUMNS[8].into(),
            text(records, |r| Some(r.urban_population_status.as_str().to_string())),
        ),
        Column::new(
            CLEANED_COLUMNS[9].into(),
            text(records, |r| Some(r.pm25_status.as_str().to_string())),
        ),
    ]
}

/// Records with their missing-value mask and imputation status.
pub fn cleaned_frame(dataset: &Dataset) -> Result<DataFrame> {
    Ok(DataFrame::new(cleaned_columns(&dataset.records))?)
}

/// The cleaned columns plus outlier flags, scores and derived features.
///
/// `group_keys[i]` is the detection group of record `i`.
pub fn featured_frame(dataset: &Dataset, group_keys: &[String]) -> Result<DataFrame> {
    let records = &dataset.records;
    let mut columns = cleaned_columns(records);
    columns.extend([
        Column::new(FEATURE_COLUMNS[0].into(), text(records, |r| Some(r.outliers.label()))),
        Column::new(
            FEATURE_COLUMNS[1].into(),
            flags(records, |r| r.outliers.has(OutlierKind::Iqr)),
        ),
        Column::new(
            FEATURE_COLUMNS[2].into(),
            flags(records, |r| r.outliers.has(OutlierKind::ZScore)),
        ),
        Column::new(
            FEATURE_COLUMNS[3].into(),
            flags(records, |r| r.outliers.has(OutlierKind::Residual)),
        ),
        Column::new(FEATURE_COLUMNS[4].into(), numbers(records, |r| r.outliers.scores.iqr)),
        Column::new(FEATURE_COLUMNS[5].into(), numbers(records, |r| r.outliers.scores.zscore)),
        Column::new(
            FEATURE_COLUMNS[6].into(),
            numbers(records, |r| r.outliers.scores.residual),
        ),
        Column::new(FEATURE_COLUMNS[7].into(), group_keys.to_vec()),
        Column::new(
            FEATURE_COLUMNS[8].into(),
            numbers(records, |r| r.features.deviation_from_group_mean),
        ),
        Column::new(
            FEATURE_COLUMNS[9].into(),
            numbers(records, |r| r.features.year_over_year_change),
        ),
    ]);
    Ok(DataFrame::new(columns)?)
}

/// One row per group summary.
pub fn summary_frame(summaries: &[SummaryStat]) -> Result<DataFrame> {
    let stat = |f: fn(&SummaryStat) -> Option<f64>| -> Vec<Option<f64>> {
        summaries.iter().map(f).collect()
    };
    let df = df![
        "group" => summaries.iter().map(|s| s.group.clone()).collect::<Vec<_>>(),
        "count" => summaries.iter().map(|s| s.count as u64).collect::<Vec<_>>(),
        "mean" => stat(|s| s.mean),
        "std" => stat(|s| s.std),
        "median" => stat(|s| s.median),
        "min" => stat(|s| s.min),
        "max" => stat(|s| s.max),
        "q1" => stat(|s| s.q1),
        "q3" => stat(|s| s.q3),
        "trend_slope" => stat(|s| s.trend_slope),
        "trend_r_squared" => stat(|s| s.trend_r_squared),
        "trend_adj_r_squared" => stat(|s| s.trend_adj_r_squared),
        "first_year" => summaries.iter().map(|s| s.first_year).collect::<Vec<_>>(),
        "last_year" => summaries.iter().map(|s| s.last_year).collect::<Vec<_>>(),
    ]?;
    Ok(df)
}

/// One row per (year, region, settlement) cell.
pub fn regional_frame(rows: &[RegionalAggregate]) -> Result<DataFrame> {
    let stat = |f: fn(&RegionalAggregate) -> Option<f64>| -> Vec<Option<f64>> {
        rows.iter().map(f).collect()
    };
    let df = df![
        "year" => rows.iter().map(|r| r.year).collect::<Vec<_>>(),
        "region" => rows.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
        "settlement" => rows.iter().map(|r| r.settlement.clone()).collect::<Vec<_>>(),
        "count" => rows.iter().map(|r| r.count as u64).collect::<Vec<_>>(),
        "mean" => stat(|r| r.mean),
        "median" => stat(|r| r.median),
        "min" => stat(|r| r.min),
        "max" => stat(|r| r.max),
        "std" => stat(|r| r.std),
        "q1" => stat(|r| r.q1),
        "q3" => stat(|r| r.q3),
    ]?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImputationStatus;

    fn dataset() -> Dataset {
        let mut gap = Record::new("Chad", 2011).with_urban_population(Some(5.0));
        gap.missing.pm25 = true;
        gap.pm25_status = ImputationStatus::Unresolved;
        Dataset::new(vec![
            Record::new("Chad", 2010)
                .with_pm25(Some(40.0))
                .with_urban_population(Some(5.0))
                .with_region("Africa"),
            gap,
        ])
    }

    #[test]
    fn test_cleaned_frame_columns() {
        let df = cleaned_frame(&dataset()).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, CLEANED_COLUMNS.to_vec());
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("pm25").unwrap().null_count(), 1);
        let status = df.column("pm25_status").unwrap().str().unwrap().get(1);
        assert_eq!(status, Some("unresolved"));
    }

    #[test]
    fn test_featured_frame_extends_cleaned() {
        let ds = dataset();
        let keys = vec!["Chad".to_string(); 2];
        let df = featured_frame(&ds, &keys).unwrap();
        assert_eq!(df.width(), CLEANED_COLUMNS.len() + FEATURE_COLUMNS.len());
        let label = df.column("outlier_label").unwrap().str().unwrap().get(0);
        assert_eq!(label, Some("normal"));
    }

    #[test]
    fn test_summary_frame_handles_absent_stats() {
        let summaries = vec![crate::features::summarize_values("Chad", &[2010], &[40.0])];
        let df = summary_frame(&summaries).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("std").unwrap().null_count(), 1);
    }
}
