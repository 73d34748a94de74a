//! Pipeline error taxonomy.

use std::time::Duration;

use lingoforge_generation::GenerationError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error returned by every store trait (jobs, groups, paths, contents).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        Self::Storage("store lock poisoned".to_string())
    }
}

/// Error produced while processing a single job or target.
///
/// Everything except [`PipelineError::Persistence`] is an item-level failure:
/// it is caught at the per-item boundary and turned into a retry-or-fail
/// decision. Persistence failures abort the whole invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The owning record or the slot inside it is missing.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl PipelineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Fatal errors propagate to the caller instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Persistence(_))
    }
}

impl From<GenerationError> for PipelineError {
    fn from(value: GenerationError) -> Self {
        match value {
            GenerationError::Timeout(after) => PipelineError::GenerationTimeout(after),
            other => PipelineError::Generation(other.to_string()),
        }
    }
}
