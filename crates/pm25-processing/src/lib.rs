//! PM2.5 Cleaning Pipeline Library
//!
//! Cleaning, outlier flagging and summary statistics for urban PM2.5
//! concentration tables, built with Rust and Polars.
//!
//! # Overview
//!
//! A run takes one tabular source (country, year, urban population, PM2.5,
//! optionally region and settlement type) through these stages:
//!
//! - **Loading**: CSV, JSON or a remote URL, validated against an explicit
//!   column schema that accepts the WHO GHO headers as aliases
//! - **Filtering**: optional year range, region and settlement filters
//! - **Imputation**: per-series linear interpolation in year, with boundary
//!   gaps left unresolved and annotated
//! - **Outlier Detection**: IQR, Z-score and linear-trend residual flags per
//!   group; values are flagged, never removed
//! - **Features**: per-group summaries, trend slopes, regional aggregates
//!   and headline metrics
//! - **Persistence**: one CSV per stage and an optional JSON report
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use pm25_processing::{Grouping, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .group_by(Grouping::Country)
//!     .zscore_threshold(2.5)
//!     .output_dir("data/processed")
//!     .build()?;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run("data/raw/WHO_PM25_urban_2022.csv")?;
//!
//! for stat in &result.summaries {
//!     println!("{}: mean {:?}, trend {:?}", stat.group, stat.mean, stat.trend_slope);
//! }
//! ```
//!
//! # Recoverable Conditions
//!
//! Load and schema problems abort a run. A group too small for a method, or
//! a missing value with no anchor on one side, does not: the run continues
//! and the condition is recorded as a
//! [`GroupAnnotation`](types::GroupAnnotation) on the result's dataset.
//!
//! # Detectors
//!
//! The three methods implement [`outliers::Detector`] and are driven by
//! [`outliers::OutlierDetector`]. They can also be used on their own:
//!
//! ```rust,ignore
//! use pm25_processing::outliers::IqrDetector;
//!
//! let bounds = IqrDetector::new(1.5).bounds(&[10.0, 11.0, 12.0, 13.0, 200.0]);
//! assert!(!bounds.unwrap().contains(200.0));
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod filters;
pub mod imputers;
pub mod loader;
pub mod outliers;
pub mod pipeline;
pub mod quality;
pub mod reporting;
pub mod stats;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ConfigValidationError, Grouping, PipelineConfig, PipelineConfigBuilder};
pub use error::{PipelineError, ResultExt};
pub use features::{HeadlineMetrics, RegionalAggregate, SummaryBuilder};
pub use filters::RecordFilter;
pub use imputers::LinearInterpolator;
pub use loader::{DataLoader, LoadReport, LoadedData, SourceFormat};
pub use outliers::{Detector, IqrDetector, OutlierDetector, ResidualDetector, ZScoreDetector};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage, ProgressReporter,
    ProgressUpdate,
};
pub use quality::{QualityAnalyzer, QualityReport};
pub use reporting::{ArtifactWriter, CleaningReport};
pub use types::{
    Dataset, GroupAnnotation, ImputationStatus, OutlierFlag, OutlierKind, PipelineResult, Record,
    RunSummary, SummaryStat,
};
