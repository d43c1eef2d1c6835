//! Outlier detection.
//!
//! Three independent detectors run over each group of the post-imputation
//! dataset:
//!
//! - [`IqrDetector`]: interquartile range fences
//! - [`ZScoreDetector`]: distance from the group mean in standard deviations
//! - [`ResidualDetector`]: distance from the group's linear trend in year
//!
//! A record may carry any combination of flags. Groups too small for a
//! method are skipped for that method and annotated with
//! [`PipelineError::InsufficientData`].

mod iqr;
mod residual;
mod zscore;

pub use iqr::{IqrBounds, IqrDetector};
pub use residual::ResidualDetector;
pub use zscore::ZScoreDetector;

use crate::config::{Grouping, PipelineConfig};
use crate::error::{INSUFFICIENT_DATA, PipelineError, Result};
use crate::types::{Dataset, OutlierFlag, OutlierKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One value taking part in a group's statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupPoint {
    /// Index of the record in the dataset.
    pub index: usize,
    pub year: i32,
    pub value: f64,
}

/// A detector's decision for one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub is_outlier: bool,
}

/// A statistical method that scores the points of one group.
pub trait Detector {
    fn kind(&self) -> OutlierKind;

    /// Smallest group the method can evaluate.
    fn required_points(&self) -> usize;

    /// Score every point, in input order.
    ///
    /// Returns [`PipelineError::InsufficientData`] when the group is too
    /// small. An empty vector means the method had nothing to say.
    fn evaluate(&self, group: &str, points: &[GroupPoint]) -> Result<Vec<Verdict>>;
}

/// Counts from one detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub groups: usize,
    pub evaluated: usize,
    pub iqr_outliers: usize,
    pub zscore_outliers: usize,
    pub residual_outliers: usize,
    pub insufficient_groups: usize,
}

impl DetectionOutcome {
    fn record(&mut self, kind: OutlierKind) {
        match kind {
            OutlierKind::Iqr => self.iqr_outliers += 1,
            OutlierKind::ZScore => self.zscore_outliers += 1,
            OutlierKind::Residual => self.residual_outliers += 1,
        }
    }
}

/// Runs every detector over every group of a dataset.
pub struct OutlierDetector {
    grouping: Grouping,
    evaluate_imputed: bool,
    iqr: IqrDetector,
    zscore: ZScoreDetector,
    residual: ResidualDetector,
}

impl OutlierDetector {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            grouping: config.group_by,
            evaluate_imputed: config.evaluate_imputed,
            iqr: IqrDetector::new(config.iqr_multiplier),
            zscore: ZScoreDetector::new(config.zscore_threshold, config.min_group_size),
            residual: ResidualDetector::new(config.residual_multiplier, config.min_group_size),
        }
    }

    fn detectors(&self) -> [&dyn Detector; 3] {
        [&self.iqr, &self.zscore, &self.residual]
    }

    /// Flag outliers in place.
    ///
    /// Existing flags and insufficient-data annotations are cleared first,
    /// so running twice gives the same result. Insufficient-data conditions
    /// become dataset annotations; any other detector error aborts. A group
    /// with no evaluable value is insufficient for every method that has a
    /// minimum size.
    pub fn detect(
        &self,
        dataset: &mut Dataset,
        processing_steps: &mut Vec<String>,
    ) -> Result<DetectionOutcome> {
        for record in &mut dataset.records {
            record.outliers = OutlierFlag::default();
        }
        dataset.clear_annotations(INSUFFICIENT_DATA);

        let groups = dataset.group_indices(self.grouping);
        let mut outcome = DetectionOutcome {
            groups: groups.len(),
            ..Default::default()
        };
        let mut insufficient: Vec<(String, PipelineError)> = Vec::new();

        for (key, indices) in &groups {
            let points: Vec<GroupPoint> = indices
                .iter()
                .filter_map(|&index| {
                    let record = &dataset.records[index];
                    record
                        .detection_value(self.evaluate_imputed)
                        .map(|value| GroupPoint {
                            index,
                            year: record.year,
                            value,
                        })
                })
                .collect();
            if points.is_empty() {
                debug!("Group '{}' has no values to evaluate", key);
            }
            outcome.evaluated += points.len();

            let mut group_insufficient = false;
            for detector in self.detectors() {
                let verdicts = match detector.evaluate(key, &points) {
                    Ok(verdicts) => verdicts,
                    Err(e) if e.is_recoverable() => {
                        group_insufficient = true;
                        insufficient.push((key.clone(), e));
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let kind = detector.kind();
                for (point, verdict) in points.iter().zip(&verdicts) {
                    let flag = &mut dataset.records[point.index].outliers;
                    match kind {
                        OutlierKind::Iqr => flag.scores.iqr = Some(verdict.score),
                        OutlierKind::ZScore => flag.scores.zscore = Some(verdict.score),
                        OutlierKind::Residual => flag.scores.residual = Some(verdict.score),
                    }
                    if verdict.is_outlier {
                        flag.mark(kind);
                        outcome.record(kind);
                    }
                }
            }
            if group_insufficient {
                outcome.insufficient_groups += 1;
            }
        }

        for (key, error) in &insufficient {
            warn!("{}", error);
            dataset.annotate(key.clone(), error);
        }

        processing_steps.push(format!(
            "Flagged outliers by {}: {} iqr, {} zscore, {} residual",
            self.grouping.as_str(),
            outcome.iqr_outliers,
            outcome.zscore_outliers,
            outcome.residual_outliers
        ));
        if outcome.insufficient_groups > 0 {
            processing_steps.push(format!(
                "Skipped small-sample methods for {} groups",
                outcome.insufficient_groups
            ));
        }

        info!(
            "Outlier detection over {} groups: {} iqr, {} zscore, {} residual",
            outcome.groups, outcome.iqr_outliers, outcome.zscore_outliers, outcome.residual_outliers
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImputationStatus, Record};
    use pretty_assertions::assert_eq;

    fn series(country: &str, values: &[f64]) -> Vec<Record> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Record::new(country, 2010 + i as i32).with_pm25(Some(v)))
            .collect()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn test_default_thresholds_flag_iqr_only() {
        let mut dataset = Dataset::new(series("A", &[10.0, 11.0, 12.0, 13.0, 200.0]));
        let mut steps = Vec::new();

        let outcome = OutlierDetector::new(&config())
            .detect(&mut dataset, &mut steps)
            .unwrap();

        assert_eq!(outcome.iqr_outliers, 1);
        assert_eq!(outcome.zscore_outliers, 0);
        assert!(dataset.records[4].outliers.has(OutlierKind::Iqr));
        assert!(dataset.records[..4].iter().all(|r| r.outliers.is_normal()));
    }

    #[test]
    fn test_lower_zscore_threshold_flags_both() {
        let mut dataset = Dataset::new(series("A", &[10.0, 11.0, 12.0, 13.0, 200.0]));
        let config = PipelineConfig::builder()
            .zscore_threshold(1.5)
            .build()
            .unwrap();
        let mut steps = Vec::new();

        OutlierDetector::new(&config)
            .detect(&mut dataset, &mut steps)
            .unwrap();

        let flag = &dataset.records[4].outliers;
        assert!(flag.has(OutlierKind::Iqr));
        assert!(flag.has(OutlierKind::ZScore));
        assert!(flag.scores.zscore.unwrap() > 1.5);
    }

    #[test]
    fn test_two_point_group_is_annotated() {
        let mut records = series("A", &[10.0, 11.0, 12.0, 13.0]);
        records.extend(series("B", &[5.0, 6.0]));
        let mut dataset = Dataset::new(records);
        let mut steps = Vec::new();

        let outcome = OutlierDetector::new(&config())
            .detect(&mut dataset, &mut steps)
            .unwrap();

        assert_eq!(outcome.insufficient_groups, 1);
        let methods: Vec<_> = dataset
            .annotations
            .iter()
            .map(|a| (a.group.as_str(), a.method.as_deref()))
            .collect();
        assert_eq!(methods, vec![("B", Some("zscore")), ("B", Some("residual"))]);
        // IQR still ran on the small group.
        assert!(dataset.records[4].outliers.scores.iqr.is_some());
        assert!(dataset.records[4].outliers.scores.zscore.is_none());
    }

    #[test]
    fn test_group_without_values_is_annotated() {
        let mut records = series("A", &[10.0, 11.0, 12.0, 13.0]);
        records.extend((2010..=2012).map(|year| {
            let mut r = Record::new("Peru", year);
            r.missing.pm25 = true;
            r.pm25_status = ImputationStatus::Unresolved;
            r
        }));
        let mut dataset = Dataset::new(records);
        let mut steps = Vec::new();

        let outcome = OutlierDetector::new(&config())
            .detect(&mut dataset, &mut steps)
            .unwrap();

        assert_eq!(outcome.groups, 2);
        assert_eq!(outcome.insufficient_groups, 1);
        let peru: Vec<_> = dataset
            .annotations
            .iter()
            .filter(|a| a.group == "Peru")
            .map(|a| (a.code.as_str(), a.method.as_deref()))
            .collect();
        assert_eq!(
            peru,
            vec![
                ("INSUFFICIENT_DATA", Some("zscore")),
                ("INSUFFICIENT_DATA", Some("residual")),
            ]
        );
        assert!(dataset.records[4..].iter().all(|r| r.outliers.is_normal()));
    }

    #[test]
    fn test_detect_is_repeatable() {
        let mut records = series("A", &[10.0, 11.0, 12.0, 13.0, 200.0]);
        records.extend(series("B", &[5.0, 6.0]));
        let mut dataset = Dataset::new(records);
        let detector = OutlierDetector::new(&config());
        let mut steps = Vec::new();

        detector.detect(&mut dataset, &mut steps).unwrap();
        let first_pass = dataset.clone();
        let outcome = detector.detect(&mut dataset, &mut steps).unwrap();

        assert_eq!(dataset.records, first_pass.records);
        assert_eq!(dataset.annotations, first_pass.annotations);
        assert_eq!(dataset.annotations.len(), 2);
        assert_eq!(outcome.iqr_outliers, 1);
    }

    #[test]
    fn test_imputed_values_are_not_evaluated() {
        let mut records = series("A", &[10.0, 11.0, 12.0, 13.0]);
        let mut imputed = Record::new("A", 2014).with_pm25(Some(500.0));
        imputed.missing.pm25 = true;
        imputed.pm25_status = ImputationStatus::Interpolated;
        records.push(imputed);
        let mut dataset = Dataset::new(records);
        let mut steps = Vec::new();

        OutlierDetector::new(&config())
            .detect(&mut dataset, &mut steps)
            .unwrap();
        assert!(dataset.records[4].outliers.is_normal());
        assert_eq!(dataset.records[4].outliers.scores.iqr, None);

        let config = PipelineConfig::builder()
            .evaluate_imputed(true)
            .build()
            .unwrap();
        OutlierDetector::new(&config)
            .detect(&mut dataset, &mut steps)
            .unwrap();
        assert!(dataset.records[4].outliers.has(OutlierKind::Iqr));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let mut records = series("B", &[3.0, 30.0, 4.0, 5.0, 6.0, 4.5]);
        records.extend(series("A", &[10.0, 11.0, 90.0, 12.0]));
        let mut first = Dataset::new(records.clone());
        records.reverse();
        let mut second = Dataset::new(records);
        let detector = OutlierDetector::new(&config());
        let mut steps = Vec::new();

        detector.detect(&mut first, &mut steps).unwrap();
        detector.detect(&mut second, &mut steps).unwrap();

        let mut a: Vec<_> = first
            .records
            .iter()
            .map(|r| (r.series_key(), r.year, r.outliers.clone()))
            .collect();
        let mut b: Vec<_> = second
            .records
            .iter()
            .map(|r| (r.series_key(), r.year, r.outliers.clone()))
            .collect();
        a.sort_by(|x, y| (&x.0, x.1).cmp(&(&y.0, y.1)));
        b.sort_by(|x, y| (&x.0, x.1).cmp(&(&y.0, y.1)));
        assert_eq!(a, b);
        assert_eq!(first.annotations, second.annotations);
    }

    #[test]
    fn test_global_grouping_pools_countries() {
        let mut records = series("A", &[10.0, 11.0]);
        records.extend(series("B", &[12.0, 13.0]));
        records.extend(series("C", &[200.0]));
        let mut dataset = Dataset::new(records);
        let config = PipelineConfig::builder()
            .group_by(Grouping::Global)
            .build()
            .unwrap();
        let mut steps = Vec::new();

        let outcome = OutlierDetector::new(&config)
            .detect(&mut dataset, &mut steps)
            .unwrap();
        assert_eq!(outcome.groups, 1);
        assert!(dataset.records[4].outliers.has(OutlierKind::Iqr));
    }
}
