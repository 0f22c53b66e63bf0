//! Top-level error type.

use thiserror::Error;

use crate::db::StoreError;

/// Errors surfaced by the queue service.
#[derive(Debug, Error)]
pub enum TubescanError {
    /// Bad caller input, not retryable.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An active job for the same user and video already exists. Carries
    /// enough of the existing job for the caller to observe it instead.
    #[error("duplicate job {job_id} ({status}, {progress}%)")]
    DuplicateJob {
        job_id: String,
        status: String,
        progress: u8,
    },

    #[error("job not found: {0}")]
    NotFound(String),

    /// The caller does not own the addressed job.
    #[error("not the owner of job {0}")]
    Ownership(String),

    /// The billing collaborator declined another scan for this user.
    #[error("scan quota exceeded for user {0}")]
    QuotaExceeded(String),

    /// The job's current status does not permit the requested operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TubescanError {
    /// Rough HTTP-equivalent status code, used by transports layered on
    /// top of the library surface.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidState(_) => 400,
            Self::Ownership(_) => 403,
            Self::NotFound(_) => 404,
            Self::DuplicateJob { .. } => 409,
            Self::QuotaExceeded(_) => 429,
            Self::Config(_) | Self::Store(_) => 500,
        }
    }
}
