//! Error types shared across the crate.
//!
//! `FraudError` is the taxonomy that crosses module boundaries and reaches the
//! training pipeline and the inference context. Estimator and metric failures
//! have their own narrower types; the model selector folds both into
//! `FraudError::CandidateFit` so a single bad candidate never aborts a run.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FraudError>;

#[derive(Error, Debug)]
pub enum FraudError {
    /// An expected column is missing or malformed.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Preprocessor must be fitted before transform is called")]
    FitBeforeTransform,

    #[error("Preprocessor is already fitted; create a new one to fit on different data")]
    AlreadyFitted,

    /// A single candidate failed to train or score. Recorded, never fatal.
    #[error("Candidate '{candidate}' failed: {reason}")]
    CandidateFit { candidate: String, reason: String },

    #[error("All {attempted} candidate model(s) failed to train or score")]
    AllCandidatesFailed { attempted: usize },

    #[error("Failed to persist artifact {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FraudError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FraudError::Schema(_) => "schema_error",
            FraudError::FitBeforeTransform => "fit_before_transform",
            FraudError::AlreadyFitted => "already_fitted",
            FraudError::CandidateFit { .. } => "candidate_fit_error",
            FraudError::AllCandidatesFailed { .. } => "all_candidates_failed",
            FraudError::Persistence { .. } => "persistence_error",
            FraudError::InvalidInput(_) => "invalid_input",
            FraudError::Config(_) => "config_error",
            FraudError::Csv(_) => "csv_error",
            FraudError::Io(_) => "io_error",
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        FraudError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure inside a single estimator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Model '{0}' cannot be persisted")]
    NotPersistable(String),
}

/// Failure computing the ranking metric.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("ROC AUC is undefined when only one class is present in the labels")]
    SingleClass,

    #[error("Scores and labels must have equal length ({scores} != {labels})")]
    LengthMismatch { scores: usize, labels: usize },

    #[error("Cannot compute a metric on empty input")]
    Empty,

    #[error("Found {0} non-finite values in scores array")]
    NonFinite(usize),

    #[error("Labels must be 0 or 1, found {0}")]
    NonBinaryLabel(u8),
}
