use crate::config::Grouping;
use crate::error::PipelineError;
use crate::features::{HeadlineMetrics, RegionalAggregate};
use crate::loader::LoadReport;
use crate::quality::QualityReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ============================================================================
// Records
// ============================================================================

/// Which of a record's nullable fields were absent in the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingMask {
    pub urban_population: bool,
    pub pm25: bool,
}

impl MissingMask {
    pub fn any(&self) -> bool {
        self.urban_population || self.pm25
    }
}

/// Outcome of imputation for one field of one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStatus {
    /// Present in the source.
    #[default]
    Observed,
    /// Filled by interpolation between two anchors.
    Interpolated,
    /// Missing at a series boundary and left empty.
    Unresolved,
}

impl ImputationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observed => "observed",
            Self::Interpolated => "interpolated",
            Self::Unresolved => "unresolved",
        }
    }
}

/// Kind of outlier flag. A record may carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutlierKind {
    #[serde(rename = "iqr_outlier")]
    Iqr,
    #[serde(rename = "zscore_outlier")]
    ZScore,
    #[serde(rename = "residual_outlier")]
    Residual,
}

impl OutlierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iqr => "iqr_outlier",
            Self::ZScore => "zscore_outlier",
            Self::Residual => "residual_outlier",
        }
    }

    /// Short method name used in annotations and logs.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Iqr => "iqr",
            Self::ZScore => "zscore",
            Self::Residual => "residual",
        }
    }
}

/// Scores computed by each detector. `None` means the method did not
/// evaluate the record (missing value, imputed value, or small group).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierScores {
    /// Distance beyond the nearest IQR fence, in IQR units (0 inside).
    pub iqr: Option<f64>,
    /// Signed Z-score against the group mean.
    pub zscore: Option<f64>,
    /// Signed residual divided by the residual standard deviation.
    pub residual: Option<f64>,
}

/// Outlier flags of one record. An empty `kinds` list means normal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierFlag {
    pub kinds: Vec<OutlierKind>,
    pub scores: OutlierScores,
}

impl OutlierFlag {
    pub fn is_normal(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn has(&self, kind: OutlierKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub(crate) fn mark(&mut self, kind: OutlierKind) {
        if !self.has(kind) {
            self.kinds.push(kind);
            self.kinds.sort();
        }
    }

    /// `normal`, or the flag names joined with `|`.
    pub fn label(&self) -> String {
        if self.is_normal() {
            return "normal".to_string();
        }
        self.kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Per-record derived features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFeatures {
    /// pm25 minus the mean of the record's group.
    pub deviation_from_group_mean: Option<f64>,
    /// pm25 minus the previous year's pm25 within the same series.
    pub year_over_year_change: Option<f64>,
}

/// One row of the table: a country's measurement for one year, plus the
/// annotations each stage attaches to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub country: String,
    pub year: i32,
    pub urban_population: Option<f64>,
    pub pm25: Option<f64>,
    pub region: Option<String>,
    pub settlement: Option<String>,

    pub missing: MissingMask,
    pub pm25_status: ImputationStatus,
    pub urban_population_status: ImputationStatus,
    pub outliers: OutlierFlag,
    pub features: RecordFeatures,
}

impl Record {
    pub fn new(country: impl Into<String>, year: i32) -> Self {
        Self {
            country: country.into(),
            year,
            urban_population: None,
            pm25: None,
            region: None,
            settlement: None,
            missing: MissingMask::default(),
            pm25_status: ImputationStatus::Observed,
            urban_population_status: ImputationStatus::Observed,
            outliers: OutlierFlag::default(),
            features: RecordFeatures::default(),
        }
    }

    pub fn with_pm25(mut self, pm25: Option<f64>) -> Self {
        self.pm25 = pm25;
        self
    }

    pub fn with_urban_population(mut self, population: Option<f64>) -> Self {
        self.urban_population = population;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_settlement(mut self, settlement: impl Into<String>) -> Self {
        self.settlement = Some(settlement.into());
        self
    }

    /// Key of the record's time series: the country, qualified by the
    /// settlement type when the source has one.
    pub fn series_key(&self) -> String {
        match &self.settlement {
            Some(s) => format!("{} / {}", self.country, s),
            None => self.country.clone(),
        }
    }

    /// Key of the record's group under `grouping`.
    pub fn group_key(&self, grouping: Grouping) -> String {
        match grouping {
            Grouping::Country => self.series_key(),
            Grouping::Year => self.year.to_string(),
            Grouping::Global => "all".to_string(),
        }
    }

    /// pm25 value eligible for outlier statistics.
    pub fn detection_value(&self, evaluate_imputed: bool) -> Option<f64> {
        match self.pm25_status {
            ImputationStatus::Observed => self.pm25,
            ImputationStatus::Interpolated if evaluate_imputed => self.pm25,
            _ => None,
        }
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// A recoverable condition recorded against a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAnnotation {
    pub group: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl GroupAnnotation {
    /// Record a recovered [`PipelineError`] against `group`.
    pub fn from_error(group: impl Into<String>, error: &PipelineError) -> Self {
        let (method, year) = match error {
            PipelineError::InsufficientData { method, .. } => (Some(method.clone()), None),
            PipelineError::ImputationGap { year, .. } => (None, Some(*year)),
            _ => (None, None),
        };
        Self {
            group: group.into(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            method,
            year,
        }
    }
}

/// The in-memory table a pipeline run works on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub annotations: Vec<GroupAnnotation>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            annotations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Smallest and largest year in the dataset.
    pub fn year_range(&self) -> Option<(i32, i32)> {
        let min = self.records.iter().map(|r| r.year).min()?;
        let max = self.records.iter().map(|r| r.year).max()?;
        Some((min, max))
    }

    /// Order records by country, settlement and year.
    pub fn sort_records(&mut self) {
        self.records.sort_by(|a, b| {
            a.country
                .cmp(&b.country)
                .then_with(|| a.settlement.cmp(&b.settlement))
                .then_with(|| a.year.cmp(&b.year))
        });
    }

    pub fn annotate(&mut self, group: impl Into<String>, error: &PipelineError) {
        self.annotations.push(GroupAnnotation::from_error(group, error));
    }

    /// Drop every annotation carrying `code`.
    pub fn clear_annotations(&mut self, code: &str) {
        self.annotations.retain(|a| a.code != code);
    }

    /// Record indices per time series, each sorted by year.
    pub fn series_indices(&self) -> BTreeMap<String, Vec<usize>> {
        self.group_indices(Grouping::Country)
    }

    /// Record indices per group, ordered by key, each sorted by year then
    /// series key so iteration is deterministic regardless of input order.
    pub fn group_indices(&self, grouping: Grouping) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, record) in self.records.iter().enumerate() {
            groups.entry(record.group_key(grouping)).or_default().push(idx);
        }
        for indices in groups.values_mut() {
            indices.sort_by(|&a, &b| {
                let (ra, rb) = (&self.records[a], &self.records[b]);
                ra.year
                    .cmp(&rb.year)
                    .then_with(|| ra.series_key().cmp(&rb.series_key()))
            });
        }
        groups
    }

    pub fn missing_pm25_count(&self) -> usize {
        self.records.iter().filter(|r| r.missing.pm25).count()
    }

    pub fn count_status(&self, status: ImputationStatus) -> usize {
        self.records.iter().filter(|r| r.pm25_status == status).count()
    }

    pub fn count_outliers(&self, kind: OutlierKind) -> usize {
        self.records.iter().filter(|r| r.outliers.has(kind)).count()
    }
}

// ============================================================================
// Summaries and results
// ============================================================================

/// Summary statistics of one group's pm25 values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStat {
    pub group: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; absent below two values.
    pub std: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
    /// OLS slope of pm25 on year, in units per year.
    pub trend_slope: Option<f64>,
    /// R² of the trend fit.
    pub trend_r_squared: Option<f64>,
    pub trend_adj_r_squared: Option<f64>,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
}

/// Counts describing one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub duration_ms: u64,
    pub rows_loaded: usize,
    pub rows_after_filter: usize,
    pub missing_pm25: usize,
    pub interpolated: usize,
    pub unresolved: usize,
    pub iqr_outliers: usize,
    pub zscore_outliers: usize,
    pub residual_outliers: usize,
    pub groups: usize,
    pub annotations: usize,
}

/// Everything a run produces, handed to the reporting layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub load: LoadReport,
    pub dataset: Dataset,
    pub summaries: Vec<SummaryStat>,
    pub regional: Vec<RegionalAggregate>,
    pub metrics: HeadlineMetrics,
    pub quality: QualityReport,
    pub summary: RunSummary,
    pub processing_steps: Vec<String>,
    pub artifacts: Vec<PathBuf>,
}
