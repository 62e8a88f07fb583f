//! Error types for the time-course report pipeline

use thiserror::Error;

/// Main error type for pipeline operations
///
/// Every variant is fatal: the pipeline has no partial-success state
/// because each stage depends on every earlier one. Missing adjusted
/// p-values are NOT an error; they surface as NaN in the contrast
/// table and are excluded from significance-filtered sets.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed input table: {reason}")]
    MalformedInput { reason: String },

    #[error("Cannot parse sample id '{sample_id}': {reason}")]
    SampleIdFormat { sample_id: String, reason: String },

    #[error("Sample alignment violated: {reason}")]
    Alignment { reason: String },

    #[error("Statistical model fitting failed: {reason}")]
    StatisticalFitting { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
