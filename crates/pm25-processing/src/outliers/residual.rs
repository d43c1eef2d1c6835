//! Residuals against a linear trend in year.

use super::{Detector, GroupPoint, Verdict};
use crate::error::{PipelineError, Result};
use crate::stats::{self, LinearFit};
use crate::types::OutlierKind;
use std::collections::BTreeSet;

/// Fits pm25 on year by least squares and flags points whose residual
/// exceeds `multiplier` residual standard deviations.
#[derive(Debug, Clone, Copy)]
pub struct ResidualDetector {
    pub multiplier: f64,
    pub min_group_size: usize,
}

impl ResidualDetector {
    pub fn new(multiplier: f64, min_group_size: usize) -> Self {
        Self {
            multiplier,
            min_group_size,
        }
    }
}

impl Detector for ResidualDetector {
    fn kind(&self) -> OutlierKind {
        OutlierKind::Residual
    }

    /// The residual standard error needs at least three points.
    fn required_points(&self) -> usize {
        self.min_group_size.max(3)
    }

    fn evaluate(&self, group: &str, points: &[GroupPoint]) -> Result<Vec<Verdict>> {
        // A trend needs distinct years, so a per-year group never qualifies.
        let count = points.iter().map(|p| p.year).collect::<BTreeSet<_>>().len();
        if count < self.required_points() {
            return Err(PipelineError::InsufficientData {
                group: group.to_string(),
                method: self.kind().method().to_string(),
                count,
                required: self.required_points(),
            });
        }

        let xs: Vec<f64> = points.iter().map(|p| p.year as f64).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.value).collect();
        let Some(fit) = LinearFit::fit(&xs, &ys) else {
            return Ok(Vec::new());
        };
        let residuals = fit.residuals(&xs, &ys);
        let Some(sigma) = stats::residual_std(&residuals) else {
            return Ok(Vec::new());
        };

        Ok(residuals
            .iter()
            .map(|&r| {
                // Residuals of an exact line are rounding noise.
                let score = if sigma > 1e-12 { r / sigma } else { 0.0 };
                Verdict {
                    score,
                    is_outlier: score.abs() > self.multiplier,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<GroupPoint> {
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
    fn test_flags_break_from_trend() {
        let detector = ResidualDetector::new(2.0, 3);
        let values = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 60.0, 19.0];
        let verdicts = detector.evaluate("A", &series(&values)).unwrap();
        let flagged: Vec<usize> = verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_outlier)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(flagged, vec![8]);
        assert!(verdicts[8].score > 2.0);
    }

    #[test]
    fn test_exact_trend_flags_nothing() {
        let detector = ResidualDetector::new(2.0, 3);
        let verdicts = detector
            .evaluate("A", &series(&[10.0, 12.0, 14.0, 16.0]))
            .unwrap();
        assert!(verdicts.iter().all(|v| !v.is_outlier && v.score == 0.0));
    }

    #[test]
    fn test_two_points_are_insufficient() {
        let detector = ResidualDetector::new(2.0, 3);
        let err = detector.evaluate("A", &series(&[10.0, 12.0])).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_DATA");
    }

    #[test]
    fn test_single_year_group_is_insufficient() {
        let detector = ResidualDetector::new(2.0, 3);
        let points: Vec<GroupPoint> = [10.0, 11.0, 30.0]
            .iter()
            .enumerate()
            .map(|(i, &value)| GroupPoint {
                index: i,
                year: 2015,
                value,
            })
            .collect();
        assert!(detector.evaluate("2015", &points).is_err());
    }
}
