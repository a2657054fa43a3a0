// ⚠️ Engine Errors
//
// Only failures the caller can act on are errors. Out-of-vocabulary input and
// the absence of a trained model are normal states, not errors.

use crate::types::CategoryId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CategorizerError>;

#[derive(Debug, Error)]
pub enum CategorizerError {
    /// Fewer than `required` categories have enough labeled examples
    #[error("insufficient training data: {eligible} eligible categories, {required} required (excluded: {excluded:?})")]
    DataInsufficient {
        eligible: usize,
        required: usize,
        excluded: Vec<CategoryId>,
    },

    #[error("a retraining run is already in progress")]
    RetrainInProgress,

    #[error("retraining was cancelled before publication")]
    Cancelled,

    #[error("cross-validated accuracy {accuracy:.3} is below the configured minimum {minimum:.3}")]
    AccuracyBelowMinimum { accuracy: f64, minimum: f64 },

    #[error("accuracy could not be estimated but a minimum of {minimum:.3} is configured")]
    AccuracyUnavailable { minimum: f64 },

    #[error("model artifact {path:?} is corrupt: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("model artifact format version {found} is not supported (expected {expected})")]
    UnsupportedArtifactVersion { found: u32, expected: u32 },

    #[error("failed to load labeled examples: {0}")]
    Source(#[source] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
