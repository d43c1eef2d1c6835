//! Feature and summary building.
//!
//! Runs after outlier detection and produces:
//!
//! - per-group [`SummaryStat`]s under the configured grouping
//! - [`RegionalAggregate`]s by year, region and settlement type
//! - dataset-wide [`HeadlineMetrics`]
//! - per-record [`RecordFeatures`](crate::types::RecordFeatures)

mod aggregates;
mod summary;

pub use aggregates::{HeadlineMetrics, RegionalAggregate, headline_metrics, regional_aggregates};
pub use summary::{summarize, summarize_values};

use crate::config::Grouping;
use crate::types::{Dataset, SummaryStat};
use std::collections::HashMap;
use tracing::info;

/// Everything the feature stage derives from a dataset.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub summaries: Vec<SummaryStat>,
    pub regional: Vec<RegionalAggregate>,
    pub metrics: HeadlineMetrics,
}

pub struct SummaryBuilder {
    grouping: Grouping,
}

impl SummaryBuilder {
    pub fn new(grouping: Grouping) -> Self {
        Self { grouping }
    }

    /// Fill per-record features and compute every summary.
    pub fn build(&self, dataset: &mut Dataset, processing_steps: &mut Vec<String>) -> FeatureSet {
        let summaries = summarize(dataset, self.grouping);
        self.derive_record_features(dataset, &summaries);
        let regional = regional_aggregates(dataset);
        let metrics = headline_metrics(dataset);

        processing_steps.push(format!(
            "Summarized {} groups by {} and {} regional cells",
            summaries.len(),
            self.grouping.as_str(),
            regional.len()
        ));
        info!(
            "Built {} group summaries and {} regional aggregates",
            summaries.len(),
            regional.len()
        );

        FeatureSet {
            summaries,
            regional,
            metrics,
        }
    }

    /// Deviation from the group mean, and change from the previous year of
    /// the same series. The change is only set for consecutive years.
    pub fn derive_record_features(&self, dataset: &mut Dataset, summaries: &[SummaryStat]) {
        let means: HashMap<&str, f64> = summaries
            .iter()
            .filter_map(|s| s.mean.map(|m| (s.group.as_str(), m)))
            .collect();

        for record in &mut dataset.records {
            let mean = means.get(record.group_key(self.grouping).as_str()).copied();
            record.features.deviation_from_group_mean = record.pm25.zip(mean).map(|(v, m)| v - m);
            record.features.year_over_year_change = None;
        }

        for indices in dataset.series_indices().values() {
            for pair in indices.windows(2) {
                let (prev, curr) = (&dataset.records[pair[0]], &dataset.records[pair[1]]);
                if curr.year != prev.year + 1 {
                    continue;
                }
                let change = curr.pm25.zip(prev.pm25).map(|(c, p)| c - p);
                dataset.records[pair[1]].features.year_over_year_change = change;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;

    #[test]
    fn test_record_features() {
        let mut dataset = Dataset::new(vec![
            Record::new("A", 2011).with_pm25(Some(14.0)),
            Record::new("A", 2010).with_pm25(Some(10.0)),
            Record::new("A", 2013).with_pm25(Some(12.0)),
            Record::new("B", 2010),
        ]);
        let mut steps = Vec::new();

        let features = SummaryBuilder::new(Grouping::Country).build(&mut dataset, &mut steps);

        assert_eq!(features.summaries.len(), 2);
        let a2011 = &dataset.records[0].features;
        assert_eq!(a2011.deviation_from_group_mean, Some(2.0));
        assert_eq!(a2011.year_over_year_change, Some(4.0));
        // 2012 is absent, so 2013 has no year-over-year change.
        assert_eq!(dataset.records[2].features.year_over_year_change, None);
        assert_eq!(dataset.records[1].features.year_over_year_change, None);
        assert_eq!(dataset.records[3].features.deviation_from_group_mean, None);
        assert_eq!(features.metrics.total_samples, 4);
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_features_follow_grouping() {
        let mut dataset = Dataset::new(vec![
            Record::new("A", 2010).with_pm25(Some(10.0)),
            Record::new("B", 2010).with_pm25(Some(30.0)),
        ]);
        let mut steps = Vec::new();

        SummaryBuilder::new(Grouping::Year).build(&mut dataset, &mut steps);
        assert_eq!(dataset.records[0].features.deviation_from_group_mean, Some(-10.0));
        assert_eq!(dataset.records[1].features.deviation_from_group_mean, Some(10.0));
    }
}
