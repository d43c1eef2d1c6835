//! Regional aggregates and headline metrics.

use crate::stats;
use crate::types::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// pm25 statistics for one (year, region, settlement) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalAggregate {
    pub year: i32,
    pub region: Option<String>,
    pub settlement: Option<String>,
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
}

/// Dataset-wide figures for a dashboard header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadlineMetrics {
    pub total_samples: usize,
    pub countries: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub average_pm25: Option<f64>,
    pub max_pm25: Option<f64>,
    pub min_pm25: Option<f64>,
}

type RegionKey = (i32, Option<String>, Option<String>);

/// Aggregate present pm25 values by year, region and settlement type.
///
/// Rows are ordered by year, then region, then settlement; a missing region
/// or settlement sorts first.
pub fn regional_aggregates(dataset: &Dataset) -> Vec<RegionalAggregate> {
    let mut cells: BTreeMap<RegionKey, Vec<f64>> = BTreeMap::new();
    for record in &dataset.records {
        let Some(value) = record.pm25 else {
            continue;
        };
        cells
            .entry((record.year, record.region.clone(), record.settlement.clone()))
            .or_default()
            .push(value);
    }

    cells
        .into_iter()
        .map(|((year, region, settlement), values)| {
            let quartiles = stats::quartiles(&values);
            RegionalAggregate {
                year,
                region,
                settlement,
                count: values.len(),
                mean: stats::mean(&values),
                median: quartiles.map(|(_, m, _)| m),
                min: stats::min(&values),
                max: stats::max(&values),
                std: stats::sample_std(&values),
                q1: quartiles.map(|(q1, _, _)| q1),
                q3: quartiles.map(|(_, _, q3)| q3),
            }
        })
        .collect()
}

/// Compute the headline metrics over every record.
///
/// `total_samples` counts rows; the pm25 figures use present values only.
pub fn headline_metrics(dataset: &Dataset) -> HeadlineMetrics {
    let values: Vec<f64> = dataset.records.iter().filter_map(|r| r.pm25).collect();
    let countries: BTreeSet<&str> = dataset.records.iter().map(|r| r.country.as_str()).collect();
    let range = dataset.year_range();

    HeadlineMetrics {
        total_samples: dataset.len(),
        countries: countries.len(),
        first_year: range.map(|(from, _)| from),
        last_year: range.map(|(_, to)| to),
        average_pm25: stats::mean(&values),
        max_pm25: stats::max(&values),
        min_pm25: stats::min(&values),
    }
}
