use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::jobs::JobStatus;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("Submission rejected: {0}")]
    ValidationRejected(String),

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Record store is at capacity ({0} records)")]
    StoreFull(usize),

    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Evaluation timed out after {0:?}")]
    EvaluationTimeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LabError {
    /// True for errors the caller caused, as opposed to infrastructure faults.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LabError::ValidationRejected(_))
    }
}

pub type Result<T> = std::result::Result<T, LabError>;
