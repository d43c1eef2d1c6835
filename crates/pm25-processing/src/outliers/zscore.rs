//! Z-score against the group mean.

use super::{Detector, GroupPoint, Verdict};
use crate::error::{PipelineError, Result};
use crate::stats;
use crate::types::OutlierKind;

/// Flags values whose absolute Z-score exceeds `threshold`.
///
/// Uses the population standard deviation of the group.
#[derive(Debug, Clone, Copy)]
pub struct ZScoreDetector {
    pub threshold: f64,
    pub min_group_size: usize,
}

impl ZScoreDetector {
    pub fn new(threshold: f64, min_group_size: usize) -> Self {
        Self {
            threshold,
            min_group_size,
        }
    }
}

impl Detector for ZScoreDetector {
    fn kind(&self) -> OutlierKind {
        OutlierKind::ZScore
    }

    fn required_points(&self) -> usize {
        self.min_group_size
    }

    fn evaluate(&self, group: &str, points: &[GroupPoint]) -> Result<Vec<Verdict>> {
        if points.len() < self.required_points() {
            return Err(PipelineError::InsufficientData {
                group: group.to_string(),
                method: self.kind().method().to_string(),
                count: points.len(),
                required: self.required_points(),
            });
        }

        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let (Some(mean), Some(std)) = (stats::mean(&values), stats::population_std(&values))
        else {
            return Ok(Vec::new());
        };

        // Identical values can leave rounding noise in the std.
        let spread = std > f64::EPSILON * mean.abs().max(1.0);
        Ok(values
            .iter()
            .map(|&v| {
                let z = if spread { (v - mean) / std } else { 0.0 };
                Verdict {
                    score: z,
                    is_outlier: z.abs() > self.threshold,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(values: &[f64]) -> Vec<GroupPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| GroupPoint {
                index: i,
                year: 2010 + i as i32,
                value,
            })
            .collect()
    }

    #[test]
    fn test_default_threshold_is_out_of_reach_for_five_points() {
        // With n = 5 the largest possible |z| is 2.0.
        let detector = ZScoreDetector::new(3.0, 3);
        let verdicts = detector
            .evaluate("A", &points(&[10.0, 11.0, 12.0, 13.0, 200.0]))
            .unwrap();
        assert!(verdicts.iter().all(|v| !v.is_outlier));
        assert!((verdicts[4].score - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_lower_threshold_flags_extreme_value() {
        let detector = ZScoreDetector::new(1.5, 3);
        let verdicts = detector
            .evaluate("A", &points(&[10.0, 11.0, 12.0, 13.0, 200.0]))
            .unwrap();
        let flagged: Vec<bool> = verdicts.iter().map(|v| v.is_outlier).collect();
        assert_eq!(flagged, vec![false, false, false, false, true]);
        assert!(verdicts[0].score < 0.0);
    }

    #[test]
    fn test_small_group_is_insufficient() {
        let detector = ZScoreDetector::new(3.0, 3);
        let err = detector.evaluate("B", &points(&[1.0, 2.0])).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_DATA");
        assert!(err.to_string().contains("zscore"));
    }

    #[test]
    fn test_zero_spread_flags_nothing() {
        let detector = ZScoreDetector::new(0.5, 3);
        let verdicts = detector.evaluate("A", &points(&[7.0, 7.0, 7.0, 7.0])).unwrap();
        assert!(verdicts.iter().all(|v| !v.is_outlier && v.score == 0.0));
    }
}
