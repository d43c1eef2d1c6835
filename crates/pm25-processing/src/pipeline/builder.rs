//! Main cleaning pipeline.
//!
//! Provides the [`Pipeline`] struct and its builder, which run the stages
//! in order: load, filter, impute, detect outliers, build features, persist.

use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::Result;
use crate::features::SummaryBuilder;
use crate::imputers::LinearInterpolator;
use crate::loader::{DataLoader, LoadedData};
use crate::outliers::OutlierDetector;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::quality::QualityAnalyzer;
use crate::reporting::{
    ArtifactWriter, CLEANED_COLUMNS, CleaningReport, FEATURE_COLUMNS, cleaned_frame,
    featured_frame, raw_frame, regional_frame, summary_frame,
};
use crate::types::{ImputationStatus, OutlierKind, PipelineResult, RunSummary};
use polars::prelude::DataFrame;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The PM2.5 cleaning pipeline.
///
/// Use [`Pipeline::builder()`] to create a pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use pm25_processing::{Pipeline, PipelineConfig};
///
/// let result = Pipeline::builder()
///     .config(PipelineConfig::builder().zscore_threshold(2.5).build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run("data/raw/WHO_PM25_urban_2022.csv")?;
///
/// println!("{} iqr outliers", result.summary.iqr_outliers);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    writer: ArtifactWriter,
}

// Lets a caller move the pipeline to a worker thread.
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load `source` and run every stage on it.
    ///
    /// # Errors
    ///
    /// Load, schema and I/O failures abort the run. Small groups and
    /// boundary gaps do not; they are returned as annotations on the
    /// result's dataset.
    pub fn run(&self, source: &str) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let result = self
            .load(source)
            .and_then(|loaded| self.process_internal(loaded, start_time));
        self.finish(result)
    }

    /// Run every stage after loading on already-loaded data.
    pub fn process(&self, loaded: LoadedData) -> Result<PipelineResult> {
        let result = self.process_internal(loaded, Instant::now());
        self.finish(result)
    }

    fn finish(&self, result: Result<PipelineResult>) -> Result<PipelineResult> {
        match result {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn load(&self, source: &str) -> Result<LoadedData> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            format!("Loading {}...", source),
        ));
        info!("Step 1: Loading source...");

        let loaded = DataLoader::load(source)?;

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            1.0,
            format!("Loaded {} records", loaded.dataset.len()),
        ));
        Ok(loaded)
    }

    /// Write a stage artifact when persistence is enabled.
    fn persist<F>(&self, stage: &str, frame: F, artifacts: &mut Vec<PathBuf>) -> Result<()>
    where
        F: FnOnce() -> Result<DataFrame>,
    {
        if !self.config.save_to_disk {
            return Ok(());
        }
        let mut df = frame()?;
        artifacts.push(self.writer.write_csv(stage, &mut df)?);
        Ok(())
    }

    fn process_internal(&self, loaded: LoadedData, start_time: Instant) -> Result<PipelineResult> {
        let LoadedData {
            table,
            mut dataset,
            report: load,
        } = loaded;
        let mut processing_steps: Vec<String> = Vec::new();
        let mut artifacts: Vec<PathBuf> = Vec::new();
        let rows_loaded = dataset.len();
        let missing_pm25 = dataset.missing_pm25_count();

        processing_steps.push(format!(
            "Loaded {} records from {} source rows",
            rows_loaded, load.rows_read
        ));
        if load.duplicate_keys_dropped > 0 {
            processing_steps.push(format!(
                "Dropped {} rows with a repeated (series, year) key",
                load.duplicate_keys_dropped
            ));
        }
        if load.negative_pm25 > 0 {
            processing_steps.push(format!(
                "Treated {} negative pm25 readings as missing",
                load.negative_pm25
            ));
        }
        self.persist("raw", || raw_frame(&table), &mut artifacts)?;

        // Step 2: Filter
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Filtering,
            0.0,
            "Applying record filter...",
        ));
        info!("Step 2: Filtering records...");
        let removed = self.config.filter.apply(&mut dataset);
        if removed > 0 {
            processing_steps.push(format!("Filtered out {} records", removed));
        }
        if dataset.is_empty() {
            warn!("No records left after filtering");
        }
        dataset.sort_records();
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Filtering,
            1.0,
            format!("{} records kept", dataset.len()),
        ));

        // Step 3: Impute
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Imputation,
            0.0,
            "Interpolating missing values...",
        ));
        info!("Step 3: Interpolating missing values...");
        let imputation = LinearInterpolator::impute(&mut dataset, &mut processing_steps);
        debug!("{:?}", imputation);
        self.persist("cleaned", || cleaned_frame(&dataset), &mut artifacts)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Imputation,
            1.0,
            format!(
                "{} values interpolated, {} unresolved",
                imputation.pm25_interpolated, imputation.pm25_unresolved
            ),
        ));

        // Step 4: Detect outliers
        self.report_progress(ProgressUpdate::new(
            PipelineStage::OutlierDetection,
            0.0,
            format!("Detecting outliers by {}...", self.config.group_by.as_str()),
        ));
        info!("Step 4: Detecting outliers...");
        let detection =
            OutlierDetector::new(&self.config).detect(&mut dataset, &mut processing_steps)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::OutlierDetection,
            1.0,
            format!("Evaluated {} groups", detection.groups),
        ));

        // Step 5: Features and summaries
        self.report_progress(ProgressUpdate::new(
            PipelineStage::FeatureBuilding,
            0.0,
            "Building summaries...",
        ));
        info!("Step 5: Building features and summaries...");
        let features =
            SummaryBuilder::new(self.config.group_by).build(&mut dataset, &mut processing_steps);
        let group_keys: Vec<String> = dataset
            .records
            .iter()
            .map(|r| r.group_key(self.config.group_by))
            .collect();
        self.persist(
            "featured",
            || featured_frame(&dataset, &group_keys),
            &mut artifacts,
        )?;
        let quality = QualityAnalyzer::analyze(
            &table,
            &load,
            &dataset,
            self.config.iqr_multiplier,
            CLEANED_COLUMNS.len() + FEATURE_COLUMNS.len(),
        );
        self.report_progress(ProgressUpdate::new(
            PipelineStage::FeatureBuilding,
            1.0,
            format!("{} group summaries", features.summaries.len()),
        ));

        // Step 6: Persist summaries and report
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Persisting,
            0.0,
            "Saving summaries...",
        ));
        info!("Step 6: Saving summaries...");
        self.persist("summary", || summary_frame(&features.summaries), &mut artifacts)?;
        self.persist("regional", || regional_frame(&features.regional), &mut artifacts)?;

        let summary = RunSummary {
            duration_ms: start_time.elapsed().as_millis() as u64,
            rows_loaded,
            rows_after_filter: dataset.len(),
            missing_pm25,
            interpolated: dataset.count_status(ImputationStatus::Interpolated),
            unresolved: dataset.count_status(ImputationStatus::Unresolved),
            iqr_outliers: dataset.count_outliers(OutlierKind::Iqr),
            zscore_outliers: dataset.count_outliers(OutlierKind::ZScore),
            residual_outliers: dataset.count_outliers(OutlierKind::Residual),
            groups: detection.groups,
            annotations: dataset.annotations.len(),
        };

        let mut result = PipelineResult {
            load,
            dataset,
            summaries: features.summaries,
            regional: features.regional,
            metrics: features.metrics,
            quality,
            summary,
            processing_steps,
            artifacts,
        };

        if self.config.save_to_disk && self.config.generate_report {
            let report_path = self.writer.output_dir().join(format!(
                "{}_report.json",
                self.config.artifact_name()
            ));
            result.artifacts.push(report_path);
            let report = CleaningReport::new(&self.config, &result);
            self.writer.write_json("report", &report)?;
        }

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Persisting,
            1.0,
            format!("{} artifacts written", result.artifacts.len()),
        ));
        info!(
            "Pipeline finished in {} ms: {} records, {} annotations",
            result.summary.duration_ms,
            result.dataset.len(),
            result.summary.annotations
        );
        Ok(result)
    }
}

/// Builder for creating a [`Pipeline`] instance.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let writer = ArtifactWriter::new(config.output_dir.clone(), config.artifact_name());

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            writer,
        })
    }
}
