//! Error types for the PM2.5 cleaning pipeline.
//!
//! Load and schema failures abort a run. Insufficient-data and imputation-gap
//! conditions are recovered per group and surfaced as
//! [`GroupAnnotation`](crate::types::GroupAnnotation)s; their variants exist
//! here so the annotation can carry the same code and message the reporting
//! layer sees for fatal errors.
//!
//! Errors serialize as `{code, message}` so they can be handed to a
//! dashboard or notebook unchanged.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Code of [`PipelineError::InsufficientData`].
pub const INSUFFICIENT_DATA: &str = "INSUFFICIENT_DATA";
/// Code of [`PipelineError::ImputationGap`].
pub const IMPUTATION_GAP: &str = "IMPUTATION_GAP";

/// The main error type for the cleaning pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source was unreachable or its contents could not be parsed.
    #[error("Failed to load '{source_name}': {reason}")]
    Load { source_name: String, reason: String },

    /// A required column is missing (or was renamed beyond recognition).
    #[error("Schema error: {0}")]
    Schema(String),

    /// A group is too small for a statistical method.
    #[error("Group '{group}' has {count} points, {method} needs at least {required}")]
    InsufficientData {
        group: String,
        method: String,
        count: usize,
        required: usize,
    },

    /// A missing value at the edge of a series could not be interpolated.
    #[error("Series '{series}' has no {side} anchor for year {year}")]
    ImputationGap {
        series: String,
        year: i32,
        side: String,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (only with the "remote" feature).
    #[cfg(feature = "remote")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::Load`].
    pub fn load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for the reporting layer.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Load { .. } => "LOAD_ERROR",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::InsufficientData { .. } => INSUFFICIENT_DATA,
            Self::ImputationGap { .. } => IMPUTATION_GAP,
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "remote")]
            Self::Http(_) => "LOAD_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the pipeline recovers from this condition at group level.
    ///
    /// Everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InsufficientData { .. } | Self::ImputationGap { .. } => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Io(e).with_context(context))
    }
}
