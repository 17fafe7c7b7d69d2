//! Job table error types.

use thiserror::Error;
use vrelay_models::{JobId, JobStateError};

pub type TableResult<T> = Result<T, TableError>;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error(transparent)]
    State(#[from] JobStateError),
}

impl TableError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TableError::NotFound(_))
    }
}
