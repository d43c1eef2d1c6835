//! Interquartile range fences.

use super::{Detector, GroupPoint, Verdict};
use crate::error::Result;
use crate::stats;
use crate::types::OutlierKind;

/// Flags values outside `[Q1 - k*IQR, Q3 + k*IQR]`.
#[derive(Debug, Clone, Copy)]
pub struct IqrDetector {
    pub multiplier: f64,
}

/// Fences computed for one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Distance outside the nearest fence in IQR units, 0 inside. With a
    /// zero IQR the raw distance is returned.
    pub fn score(&self, value: f64) -> f64 {
        let distance = if value < self.lower {
            self.lower - value
        } else if value > self.upper {
            value - self.upper
        } else {
            0.0
        };
        let iqr = self.iqr();
        if iqr > 0.0 { distance / iqr } else { distance }
    }
}

impl IqrDetector {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    pub fn bounds(&self, values: &[f64]) -> Option<IqrBounds> {
        let (q1, median, q3) = stats::quartiles(values)?;
        let iqr = q3 - q1;
        Some(IqrBounds {
            q1,
            median,
            q3,
            lower: q1 - self.multiplier * iqr,
            upper: q3 + self.multiplier * iqr,
        })
    }
}

impl Detector for IqrDetector {
    fn kind(&self) -> OutlierKind {
        OutlierKind::Iqr
    }

    fn required_points(&self) -> usize {
        1
    }

    fn evaluate(&self, _group: &str, points: &[GroupPoint]) -> Result<Vec<Verdict>> {
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let Some(bounds) = self.bounds(&values) else {
            return Ok(Vec::new());
        };
        Ok(values
            .iter()
            .map(|&v| Verdict {
                score: bounds.score(v),
                is_outlier: !bounds.contains(v),
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
    fn test_flags_extreme_value() {
        let detector = IqrDetector::new(1.5);
        let verdicts = detector
            .evaluate("A", &points(&[10.0, 11.0, 12.0, 13.0, 200.0]))
            .unwrap();
        let flagged: Vec<bool> = verdicts.iter().map(|v| v.is_outlier).collect();
        assert_eq!(flagged, vec![false, false, false, false, true]);
        // Q1 = 11, Q3 = 13, upper fence = 16, 200 is 184 beyond = 92 IQRs
        assert!((verdicts[4].score - 92.0).abs() < 1e-9);
        assert_eq!(verdicts[0].score, 0.0);
    }

    #[test]
    fn test_bounds_are_ordered_and_contain_normals() {
        let detector = IqrDetector::new(1.5);
        let values = [3.0, 18.5, 7.25, 40.0, 12.0, 9.0, 11.0, 95.0, 14.0];
        let bounds = detector.bounds(&values).unwrap();
        assert!(bounds.q1 <= bounds.median && bounds.median <= bounds.q3);
        assert!(bounds.lower <= bounds.q1 && bounds.q3 <= bounds.upper);

        let verdicts = detector.evaluate("A", &points(&values)).unwrap();
        for (v, verdict) in values.iter().zip(&verdicts) {
            if !verdict.is_outlier {
                assert!(bounds.contains(*v));
            }
        }
    }

    #[test]
    fn test_constant_group_flags_nothing() {
        let detector = IqrDetector::new(1.5);
        let verdicts = detector.evaluate("A", &points(&[5.0, 5.0, 5.0])).unwrap();
        assert!(verdicts.iter().all(|v| !v.is_outlier && v.score == 0.0));
    }

    #[test]
    fn test_single_point_is_inside() {
        let detector = IqrDetector::new(1.5);
        let verdicts = detector.evaluate("A", &points(&[42.0])).unwrap();
        assert_eq!(verdicts.len(), 1);
        assert!(!verdicts[0].is_outlier);
    }
}
