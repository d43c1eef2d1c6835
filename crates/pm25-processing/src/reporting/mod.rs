//! Artifact and report generation.
//!
//! A run persists one CSV per stage plus two summary tables:
//!
//! - `<name>_raw.csv`: the source table as read
//! - `<name>_cleaned.csv`: records with missing mask and imputation status
//! - `<name>_featured.csv`: cleaned records plus outlier flags and features
//! - `<name>_summary.csv`: one row per group
//! - `<name>_regional.csv`: one row per (year, region, settlement)
//!
//! and, when enabled, `<name>_report.json` holding a [`CleaningReport`].

mod frames;
mod report;
mod writer;

pub use frames::{
    CLEANED_COLUMNS, FEATURE_COLUMNS, cleaned_frame, featured_frame, raw_frame, regional_frame,
    summary_frame,
};
pub use report::CleaningReport;
pub use writer::ArtifactWriter;
