//! Row filtering by year range, region and settlement type.

use crate::types::Dataset;
use crate::types::Record;
use serde::{Deserialize, Serialize};

/// Criteria a record must meet to stay in the dataset.
///
/// Empty lists and `None` bounds match everything. Region and settlement
/// comparisons ignore ASCII case; a record without a region never matches
/// a non-empty region list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub regions: Vec<String>,
    pub settlements: Vec<String>,
}

fn matches_any(value: Option<&str>, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    value.is_some_and(|v| wanted.iter().any(|w| w.eq_ignore_ascii_case(v)))
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.year_from.is_none()
            && self.year_to.is_none()
            && self.regions.is_empty()
            && self.settlements.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.year_from.is_none_or(|from| record.year >= from)
            && self.year_to.is_none_or(|to| record.year <= to)
            && matches_any(record.region.as_deref(), &self.regions)
            && matches_any(record.settlement.as_deref(), &self.settlements)
    }

    /// Drop non-matching records. Returns the number removed.
    pub fn apply(&self, dataset: &mut Dataset) -> usize {
        if self.is_empty() {
            return 0;
        }
        let before = dataset.len();
        dataset.records.retain(|r| self.matches(r));
        before - dataset.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Record::new("France", 2010).with_region("Europe").with_settlement("Urban"),
            Record::new("France", 2015).with_region("Europe").with_settlement("Total"),
            Record::new("India", 2012).with_region("South-East Asia").with_settlement("Urban"),
            Record::new("Chad", 2019),
        ])
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let mut dataset = sample();
        assert_eq!(RecordFilter::default().apply(&mut dataset), 0);
        assert_eq!(dataset.len(), 4);
    }

    #[test]
    fn test_year_range_is_inclusive() {
        let filter = RecordFilter {
            year_from: Some(2012),
            year_to: Some(2015),
            ..Default::default()
        };
        let mut dataset = sample();
        assert_eq!(filter.apply(&mut dataset), 2);
        let years: Vec<_> = dataset.records.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2015, 2012]);
    }

    #[test]
    fn test_region_and_settlement_case_insensitive() {
        let filter = RecordFilter {
            regions: vec!["europe".to_string()],
            settlements: vec!["URBAN".to_string()],
            ..Default::default()
        };
        let mut dataset = sample();
        filter.apply(&mut dataset);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].year, 2010);
    }

    #[test]
    fn test_missing_region_does_not_match_region_list() {
        let filter = RecordFilter {
            regions: vec!["Africa".to_string()],
            ..Default::default()
        };
        assert!(!filter.matches(&Record::new("Chad", 2019)));
    }
}
