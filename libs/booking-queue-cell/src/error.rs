use thiserror::Error;

use appointment_cell::{AppointmentError, AppointmentStatus};
use clinic_cell::ClinicError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum BookingQueueError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Timed out after {timeout_ms} ms waiting for queue scope {scope}")]
    ScopeLockTimeout { scope: String, timeout_ms: u64 },

    #[error("Gave up on queue scope {scope} after {attempts} conflicting attempts")]
    TooManyConflicts { scope: String, attempts: u32 },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Token {ongoing_token} is already ongoing in {scope}")]
    QueueConflict { scope: String, ongoing_token: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    StoreError(String),
}

impl BookingQueueError {
    /// Contention failures: the whole booking or transition may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingQueueError::ScopeLockTimeout { .. } | BookingQueueError::TooManyConflicts { .. }
        )
    }
}

impl From<ClinicError> for BookingQueueError {
    fn from(err: ClinicError) -> Self {
        match err {
            ClinicError::InvalidConfiguration(msg) => BookingQueueError::InvalidConfiguration(msg),
        }
    }
}

impl From<AppointmentError> for BookingQueueError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::InvalidTransition { from, to } => {
                BookingQueueError::InvalidTransition { from, to }
            }
            AppointmentError::QueueConflict { scope, ongoing_token } => {
                BookingQueueError::QueueConflict { scope, ongoing_token }
            }
            AppointmentError::NotFound(id) => BookingQueueError::NotFound(format!("appointment {}", id)),
        }
    }
}

impl From<BookingQueueError> for AppError {
    fn from(err: BookingQueueError) -> Self {
        match err {
            BookingQueueError::NotFound(_) => AppError::NotFound(err.to_string()),
            BookingQueueError::ValidationError(_) | BookingQueueError::InvalidConfiguration(_) => {
                AppError::ValidationError(err.to_string())
            }
            BookingQueueError::InvalidTransition { .. } | BookingQueueError::QueueConflict { .. } => {
                AppError::Conflict(err.to_string())
            }
            BookingQueueError::ScopeLockTimeout { .. } | BookingQueueError::TooManyConflicts { .. } => {
                tracing::warn!("Queue contention surfaced to caller: {}", err);
                AppError::Unavailable("Could not complete the request, please retry".to_string())
            }
            BookingQueueError::RedisError(_)
            | BookingQueueError::SerializationError(_)
            | BookingQueueError::StoreError(_) => {
                tracing::error!("Queue storage failure: {}", err);
                AppError::Database("Operation failed".to_string())
            }
        }
    }
}
