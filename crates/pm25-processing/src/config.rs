//! Configuration types for the cleaning pipeline.
//!
//! All thresholds are carried in [`PipelineConfig`] and passed explicitly to
//! each stage. Use the builder for validated construction, or deserialize a
//! JSON file and call [`PipelineConfig::validate`].

use crate::filters::RecordFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default IQR fence multiplier.
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
/// Default absolute Z-score above which a value is flagged.
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;
/// Default multiple of the residual standard deviation for residual flags.
pub const DEFAULT_RESIDUAL_MULTIPLIER: f64 = 2.0;
/// Smallest group for which Z-score and residual detection run.
pub const DEFAULT_MIN_GROUP_SIZE: usize = 3;

/// How records are grouped for outlier detection and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// One group per country series (country + settlement type).
    #[default]
    Country,
    /// One group per year across all countries.
    Year,
    /// A single group holding every record.
    Global,
}

impl Grouping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Year => "year",
            Self::Global => "global",
        }
    }
}

/// Configuration for the cleaning pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use pm25_processing::config::{Grouping, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .zscore_threshold(2.5)
///     .group_by(Grouping::Year)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// IQR fence multiplier `k` in `[Q1 - k*IQR, Q3 + k*IQR]`.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Absolute Z-score above which a value is flagged.
    /// Default: 3.0
    pub zscore_threshold: f64,

    /// Multiple of the residual standard deviation above which a value is
    /// flagged against its group's linear trend.
    /// Default: 2.0
    pub residual_multiplier: f64,

    /// Groups with fewer points skip Z-score and residual detection.
    /// Default: 3
    pub min_group_size: usize,

    /// Grouping used by the outlier detector and summary builder.
    /// Default: Country
    pub group_by: Grouping,

    /// Whether interpolated values take part in outlier detection.
    /// Default: false
    pub evaluate_imputed: bool,

    /// Row filter applied right after loading.
    /// Default: keeps everything
    pub filter: RecordFilter,

    /// Processing directory for stage artifacts.
    /// Default: "data/processed"
    pub output_dir: PathBuf,

    /// Base name for artifacts. If None, "pm25" is used.
    /// Default: None
    pub output_name: Option<String>,

    /// Whether to persist stage artifacts.
    /// When false, results stay in memory only.
    /// Default: true
    pub save_to_disk: bool,

    /// Whether to write a JSON report next to the artifacts.
    /// Default: false
    pub generate_report: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            zscore_threshold: DEFAULT_ZSCORE_THRESHOLD,
            residual_multiplier: DEFAULT_RESIDUAL_MULTIPLIER,
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            group_by: Grouping::default(),
            evaluate_imputed: false,
            filter: RecordFilter::default(),
            output_dir: PathBuf::from("data/processed"),
            output_name: None,
            save_to_disk: true,
            generate_report: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Artifact base name.
    pub fn artifact_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or("pm25")
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [
            ("iqr_multiplier", self.iqr_multiplier),
            ("zscore_threshold", self.zscore_threshold),
            ("residual_multiplier", self.residual_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigValidationError::InvalidMultiplier {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.min_group_size < DEFAULT_MIN_GROUP_SIZE {
            return Err(ConfigValidationError::InvalidMinGroupSize(
                self.min_group_size,
            ));
        }

        if let (Some(from), Some(to)) = (self.filter.year_from, self.filter.year_to)
            && from > to
        {
            return Err(ConfigValidationError::InvalidYearRange { from, to });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be a positive number)")]
    InvalidMultiplier { field: String, value: f64 },

    #[error("Invalid minimum group size: {0} (must be at least 3)")]
    InvalidMinGroupSize(usize),

    #[error("Invalid year range: {from} > {to}")]
    InvalidYearRange { from: i32, to: i32 },
}

impl From<ConfigValidationError> for crate::error::PipelineError {
    fn from(e: ConfigValidationError) -> Self {
        crate::error::PipelineError::InvalidConfig(e.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    iqr_multiplier: Option<f64>,
    zscore_threshold: Option<f64>,
    residual_multiplier: Option<f64>,
    min_group_size: Option<usize>,
    group_by: Option<Grouping>,
    evaluate_imputed: Option<bool>,
    filter: Option<RecordFilter>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
    save_to_disk: Option<bool>,
    generate_report: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the IQR fence multiplier.
    pub fn iqr_multiplier(mut self, k: f64) -> Self {
        self.iqr_multiplier = Some(k);
        self
    }

    /// Set the absolute Z-score threshold.
    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.zscore_threshold = Some(threshold);
        self
    }

    /// Set the residual standard deviation multiple.
    pub fn residual_multiplier(mut self, k: f64) -> Self {
        self.residual_multiplier = Some(k);
        self
    }

    /// Set the minimum group size for Z-score and residual detection.
    pub fn min_group_size(mut self, n: usize) -> Self {
        self.min_group_size = Some(n);
        self
    }

    /// Set the grouping used for detection and summaries.
    pub fn group_by(mut self, grouping: Grouping) -> Self {
        self.group_by = Some(grouping);
        self
    }

    /// Let interpolated values take part in outlier detection.
    pub fn evaluate_imputed(mut self, evaluate: bool) -> Self {
        self.evaluate_imputed = Some(evaluate);
        self
    }

    /// Set the row filter applied after loading.
    pub fn filter(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the processing directory for artifacts.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the artifact base name (without extension).
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Enable or disable persisting stage artifacts.
    pub fn save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = Some(save);
        self
    }

    /// Enable or disable writing the JSON report.
    pub fn generate_report(mut self, generate: bool) -> Self {
        self.generate_report = Some(generate);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            iqr_multiplier: self.iqr_multiplier.unwrap_or(DEFAULT_IQR_MULTIPLIER),
            zscore_threshold: self.zscore_threshold.unwrap_or(DEFAULT_ZSCORE_THRESHOLD),
            residual_multiplier: self
                .residual_multiplier
                .unwrap_or(DEFAULT_RESIDUAL_MULTIPLIER),
            min_group_size: self.min_group_size.unwrap_or(DEFAULT_MIN_GROUP_SIZE),
            group_by: self.group_by.unwrap_or_default(),
            evaluate_imputed: self.evaluate_imputed.unwrap_or(false),
            filter: self.filter.unwrap_or_default(),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from("data/processed")),
            output_name: self.output_name,
            save_to_disk: self.save_to_disk.unwrap_or(true),
            generate_report: self.generate_report.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }
}
