//! Progress reporting for the cleaning pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use pm25_processing::Pipeline;
//!
//! let result = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run("data/raw/pm25.csv")?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the cleaning pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading and validating the source
    Loading,
    /// Applying the year / region / settlement filter
    Filtering,
    /// Interpolating missing values
    Imputation,
    /// Flagging outliers
    OutlierDetection,
    /// Building summaries and per-record features
    FeatureBuilding,
    /// Writing stage artifacts and the report
    Persisting,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Data",
            Self::Filtering => "Filtering Records",
            Self::Imputation => "Interpolating Gaps",
            Self::OutlierDetection => "Detecting Outliers",
            Self::FeatureBuilding => "Building Summaries",
            Self::Persisting => "Saving Artifacts",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run spent in this stage (0.0 - 1.0).
    ///
    /// Weights of the working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.20,
            Self::Filtering => 0.05,
            Self::Imputation => 0.20,
            Self::OutlierDetection => 0.25,
            Self::FeatureBuilding => 0.15,
            Self::Persisting => 0.15,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Filtering => 0.20,
            Self::Imputation => 0.25,
            Self::OutlierDetection => 0.45,
            Self::FeatureBuilding => 0.70,
            Self::Persisting => 0.85,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A progress update emitted between and within stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Complete,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Failed,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates during a run.
///
/// Implementations must be `Send + Sync` so a pipeline moved to a worker
/// thread can still report to its owner.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PipelineStage::Imputation, 0.5, "halfway");
        assert_eq!(update.stage, PipelineStage::Imputation);
        assert!((update.progress - 0.35).abs() < 1e-6);
        assert_eq!(update.stage_progress, 0.5);
    }

    #[test]
    fn test_progress_update_clamps() {
        let update = ProgressUpdate::new(PipelineStage::Persisting, 4.0, "overshoot");
        assert_eq!(update.progress, 1.0);
        assert_eq!(update.stage_progress, 1.0);
    }

    #[test]
    fn test_progress_update_terminal() {
        assert_eq!(ProgressUpdate::complete("done").progress, 1.0);
        let failed = ProgressUpdate::failed("boom");
        assert_eq!(failed.stage, PipelineStage::Failed);
        assert_eq!(failed.message, "boom");
    }

    #[test]
    fn test_stage_weights_sum_to_one() {
        let stages = [
            PipelineStage::Loading,
            PipelineStage::Filtering,
            PipelineStage::Imputation,
            PipelineStage::OutlierDetection,
            PipelineStage::FeatureBuilding,
            PipelineStage::Persisting,
        ];
        let total: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-6);

        // Each stage starts where the previous one ends.
        for pair in stages.windows(2) {
            let end = pair[0].base_progress() + pair[0].weight();
            assert!((end - pair[1].base_progress()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stage_json_values() {
        assert_eq!(
            serde_json::to_string(&PipelineStage::OutlierDetection).unwrap(),
            "\"outlier_detection\""
        );
    }

    #[test]
    fn test_closure_reporter_across_threads() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let reporter: Arc<dyn ProgressReporter> =
            Arc::new(ClosureProgressReporter::new(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reporter = reporter.clone();
                std::thread::spawn(move || {
                    reporter.report(ProgressUpdate::new(PipelineStage::Loading, 0.0, "tick"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }
}
