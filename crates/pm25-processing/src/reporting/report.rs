//! JSON run report for notebooks and dashboards.

use crate::config::PipelineConfig;
use crate::features::HeadlineMetrics;
use crate::loader::LoadReport;
use crate::quality::QualityReport;
use crate::types::{GroupAnnotation, PipelineResult, RunSummary, SummaryStat};
use chrono::Local;
use serde::{Deserialize, Serialize};

/// Everything about a run except the record-level tables, which live in
/// the CSV artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningReport {
    pub generated_at: String,
    pub input: String,
    pub config: PipelineConfig,
    pub load: LoadReport,
    pub summary: RunSummary,
    pub metrics: HeadlineMetrics,
    pub quality: QualityReport,
    pub group_summaries: Vec<SummaryStat>,
    /// Recovered conditions, one entry per group and method or gap.
    pub annotations: Vec<GroupAnnotation>,
    pub processing_steps: Vec<String>,
    pub artifacts: Vec<String>,
}

impl CleaningReport {
    pub fn new(config: &PipelineConfig, result: &PipelineResult) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input: result.load.source.clone(),
            config: config.clone(),
            load: result.load.clone(),
            summary: result.summary.clone(),
            metrics: result.metrics.clone(),
            quality: result.quality.clone(),
            group_summaries: result.summaries.clone(),
            annotations: result.dataset.annotations.clone(),
            processing_steps: result.processing_steps.clone(),
            artifacts: result
                .artifacts
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        }
    }
}
