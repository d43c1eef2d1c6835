//! Linear interpolation within a time series.
//!
//! Gaps are filled from the nearest earlier and later known values, weighted
//! by year distance. A gap with no anchor on one side is left empty and
//! reported as an [`ImputationGap`](crate::error::PipelineError::ImputationGap)
//! annotation instead of being extrapolated.

use crate::error::{IMPUTATION_GAP, PipelineError};
use crate::types::{Dataset, ImputationStatus, Record};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Counts from one imputation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputationOutcome {
    pub series: usize,
    pub pm25_interpolated: usize,
    pub pm25_unresolved: usize,
    pub population_interpolated: usize,
    pub population_unresolved: usize,
}

/// Result of interpolating one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    Known(f64),
    Interpolated(f64),
    /// No earlier anchor.
    LeadingGap,
    /// No later anchor.
    TrailingGap,
}

/// Per-series linear interpolation by year.
pub struct LinearInterpolator;

impl LinearInterpolator {
    /// Fill the gaps of one series.
    ///
    /// `points` must be sorted by year with unique years. A point is known
    /// when its value is `Some`.
    pub fn interpolate(points: &[(i32, Option<f64>)]) -> Vec<Fill> {
        let known: Vec<usize> = points
            .iter()
            .enumerate()
            .filter_map(|(i, (_, v))| v.map(|_| i))
            .collect();

        points
            .iter()
            .enumerate()
            .map(|(i, &(year, value))| {
                if let Some(v) = value {
                    return Fill::Known(v);
                }
                // First known index after `i`; the one before it is the earlier anchor.
                let next_pos = known.partition_point(|&k| k < i);
                let prev = next_pos.checked_sub(1).map(|p| known[p]);
                let next = known.get(next_pos).copied();

                match (prev, next) {
                    (Some(p), Some(n)) => {
                        let (y0, v0) = (points[p].0 as f64, points[p].1.unwrap_or_default());
                        let (y1, v1) = (points[n].0 as f64, points[n].1.unwrap_or_default());
                        let t = (year as f64 - y0) / (y1 - y0);
                        Fill::Interpolated(v0 + (v1 - v0) * t)
                    }
                    (None, _) => Fill::LeadingGap,
                    (Some(_), None) => Fill::TrailingGap,
                }
            })
            .collect()
    }

    /// Interpolate pm25 and urban population within every series.
    ///
    /// Known values are those not flagged in the record's
    /// [`MissingMask`](crate::types::MissingMask), and gap annotations from a
    /// previous pass are replaced, so a second pass over the same dataset
    /// produces the same fills and annotations.
    pub fn impute(dataset: &mut Dataset, processing_steps: &mut Vec<String>) -> ImputationOutcome {
        dataset.clear_annotations(IMPUTATION_GAP);
        let series = dataset.series_indices();
        let mut outcome = ImputationOutcome {
            series: series.len(),
            ..Default::default()
        };
        let mut gaps: Vec<(String, PipelineError)> = Vec::new();

        for (key, indices) in &series {
            let pm25_points: Vec<(i32, Option<f64>)> = indices
                .iter()
                .map(|&i| pm25_anchor(&dataset.records[i]))
                .collect();
            let population_points: Vec<(i32, Option<f64>)> = indices
                .iter()
                .map(|&i| population_anchor(&dataset.records[i]))
                .collect();

            let pm25_fills = Self::interpolate(&pm25_points);
            let population_fills = Self::interpolate(&population_points);

            for (pos, &idx) in indices.iter().enumerate() {
                let record = &mut dataset.records[idx];

                match pm25_fills[pos] {
                    Fill::Known(_) => {}
                    Fill::Interpolated(v) => {
                        record.pm25 = Some(v);
                        record.pm25_status = ImputationStatus::Interpolated;
                        outcome.pm25_interpolated += 1;
                    }
                    fill @ (Fill::LeadingGap | Fill::TrailingGap) => {
                        record.pm25 = None;
                        record.pm25_status = ImputationStatus::Unresolved;
                        outcome.pm25_unresolved += 1;
                        let side = if fill == Fill::LeadingGap { "earlier" } else { "later" };
                        gaps.push((
                            key.clone(),
                            PipelineError::ImputationGap {
                                series: key.clone(),
                                year: record.year,
                                side: side.to_string(),
                            },
                        ));
                    }
                }

                match population_fills[pos] {
                    Fill::Known(_) => {}
                    Fill::Interpolated(v) => {
                        record.urban_population = Some(v);
                        record.urban_population_status = ImputationStatus::Interpolated;
                        outcome.population_interpolated += 1;
                    }
                    Fill::LeadingGap | Fill::TrailingGap => {
                        record.urban_population = None;
                        record.urban_population_status = ImputationStatus::Unresolved;
                        outcome.population_unresolved += 1;
                    }
                }
            }
        }

        for (key, gap) in &gaps {
            debug!("{}", gap);
            dataset.annotate(key.clone(), gap);
        }

        if outcome.pm25_interpolated > 0 {
            processing_steps.push(format!(
                "Interpolated {} missing pm25 values across {} series",
                outcome.pm25_interpolated, outcome.series
            ));
        }
        if outcome.pm25_unresolved > 0 {
            processing_steps.push(format!(
                "Left {} boundary pm25 gaps unresolved",
                outcome.pm25_unresolved
            ));
        }
        if outcome.population_interpolated > 0 {
            processing_steps.push(format!(
                "Interpolated {} missing urban population values",
                outcome.population_interpolated
            ));
        }

        info!(
            "Imputation: {} interpolated, {} unresolved",
            outcome.pm25_interpolated, outcome.pm25_unresolved
        );
        outcome
    }
}

fn pm25_anchor(record: &Record) -> (i32, Option<f64>) {
    let value = if record.missing.pm25 { None } else { record.pm25 };
    (record.year, value)
}

fn population_anchor(record: &Record) -> (i32, Option<f64>) {
    let value = if record.missing.urban_population {
        None
    } else {
        record.urban_population
    };
    (record.year, value)
}
