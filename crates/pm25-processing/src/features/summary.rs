//! Per-group summary statistics.

use crate::config::Grouping;
use crate::stats::{self, LinearFit};
use crate::types::{Dataset, SummaryStat};

/// Summarize the present pm25 values (observed and interpolated) of every
/// group, in group key order.
pub fn summarize(dataset: &Dataset, grouping: Grouping) -> Vec<SummaryStat> {
    dataset
        .group_indices(grouping)
        .into_iter()
        .map(|(group, indices)| {
            let (years, values): (Vec<i32>, Vec<f64>) = indices
                .iter()
                .filter_map(|&i| {
                    let record = &dataset.records[i];
                    record.pm25.map(|v| (record.year, v))
                })
                .unzip();
            summarize_values(group, &years, &values)
        })
        .collect()
}

/// Summary of one group's values, with `years[i]` the year of `values[i]`.
pub fn summarize_values(group: impl Into<String>, years: &[i32], values: &[f64]) -> SummaryStat {
    let quartiles = stats::quartiles(values);
    let xs: Vec<f64> = years.iter().map(|&y| y as f64).collect();
    let fit = LinearFit::fit(&xs, values);
    let r_squared = fit.and_then(|fit| fit.r_squared(&xs, values));

    SummaryStat {
        group: group.into(),
        count: values.len(),
        mean: stats::mean(values),
        std: stats::sample_std(values),
        median: quartiles.map(|(_, m, _)| m),
        min: stats::min(values),
        max: stats::max(values),
        q1: quartiles.map(|(q1, _, _)| q1),
        q3: quartiles.map(|(_, _, q3)| q3),
        trend_slope: fit.map(|fit| fit.slope),
        trend_r_squared: r_squared,
        trend_adj_r_squared: r_squared.and_then(|r2| stats::adjusted_r_squared(r2, values.len())),
        first_year: years.iter().copied().min(),
        last_year: years.iter().copied().max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;

    #[test]
    fn test_summary_of_rising_series() {
        let dataset = Dataset::new(vec![
            Record::new("A", 2012).with_pm25(Some(14.0)),
            Record::new("A", 2010).with_pm25(Some(10.0)),
            Record::new("A", 2011).with_pm25(Some(12.0)),
            Record::new("A", 2013),
        ]);

        let summaries = summarize(&dataset, Grouping::Country);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.count, 3);
        assert_eq!(s.mean, Some(12.0));
        assert_eq!(s.std, Some(2.0));
        assert_eq!(s.median, Some(12.0));
        assert_eq!((s.min, s.max), (Some(10.0), Some(14.0)));
        assert_eq!((s.q1, s.q3), (Some(11.0), Some(13.0)));
        assert!((s.trend_slope.unwrap() - 2.0).abs() < 1e-9);
        assert!((s.trend_r_squared.unwrap() - 1.0).abs() < 1e-9);
        assert!((s.trend_adj_r_squared.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!((s.first_year, s.last_year), (Some(2010), Some(2012)));
    }

    #[test]
    fn test_trend_fit_diagnostics() {
        let s = summarize_values("A", &[2010, 2011, 2012, 2013], &[10.0, 13.0, 12.0, 15.0]);
        assert!((s.trend_slope.unwrap() - 1.4).abs() < 1e-9);
        let r2 = s.trend_r_squared.unwrap();
        assert!((r2 - 9.8 / 13.0).abs() < 1e-9);
        assert!(s.trend_adj_r_squared.unwrap() < r2);

        // Two points fit exactly but leave no degrees of freedom.
        let s = summarize_values("B", &[2010, 2011], &[10.0, 12.0]);
        assert!(s.trend_r_squared.is_some());
        assert_eq!(s.trend_adj_r_squared, None);
    }

    #[test]
    fn test_summary_without_values() {
        let s = summarize_values("empty", &[], &[]);
        assert_eq!(s.count, 0);
        assert_eq!(s.mean, None);
        assert_eq!(s.trend_slope, None);
    }

    #[test]
    fn test_single_year_has_no_trend() {
        let s = summarize_values("2015", &[2015, 2015], &[3.0, 5.0]);
        assert_eq!(s.trend_slope, None);
        assert_eq!(s.trend_r_squared, None);
        assert_eq!(s.mean, Some(4.0));
    }
}
