use primm_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the progress core.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Stage, course, lesson, account or record does not exist, or the stage
    /// is of another type than the submission.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stage definition lacks the data needed to grade it.
    #[error("invalid stage: {0}")]
    InvalidStage(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The code executor failed to produce a result.
    #[error("execution failed: {0}")]
    Execution(String),

    #[error("storage failure during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
}

pub type ProgressResult<T> = Result<T, ProgressError>;

impl ProgressError {
    /// Build a mapper that wraps a storage error with the failing operation.
    ///
    /// `NotFound` and `Conflict` keep their meaning; everything else becomes a
    /// storage failure.
    pub fn storage(operation: &'static str) -> impl FnOnce(StorageError) -> ProgressError {
        move |source| match source {
            StorageError::NotFound(msg) => ProgressError::NotFound(msg),
            StorageError::Conflict(msg) => ProgressError::Conflict(msg),
            source => ProgressError::Storage { operation, source },
        }
    }

    /// Message safe to show to end users. Storage and executor internals are
    /// never included.
    pub fn user_message(&self) -> String {
        match self {
            ProgressError::NotFound(msg) => msg.clone(),
            ProgressError::InvalidStage(_) => {
                "This stage is not configured correctly. Please contact your teacher.".to_string()
            }
            ProgressError::Conflict(msg) => msg.clone(),
            ProgressError::Execution(_) => {
                "Your code could not be executed right now. Please try again.".to_string()
            }
            ProgressError::Storage { .. } => {
                "Something went wrong while saving your progress. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_keeps_meaning() {
        let err = ProgressError::storage("credit account")(StorageError::NotFound(
            "account user:4 not found".to_string(),
        ));
        assert!(matches!(err, ProgressError::NotFound(_)));
    }

    #[test]
    fn user_message_hides_backend_details() {
        let err = ProgressError::storage("upsert completion")(StorageError::Backend(
            "connection refused at 10.0.0.3:5432".to_string(),
        ));
        assert!(err.to_string().contains("upsert completion"));
        assert!(!err.user_message().contains("10.0.0.3"));
    }
}
