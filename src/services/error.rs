use thiserror::Error;

use crate::database::DatabaseError;
use crate::storage::StorageError;

/// Errors surfaced by request-driven operations. The first one wins and
/// nothing has been written when it is returned.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid assignee: {0}")]
    InvalidAssignee(uuid::Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] DatabaseError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
