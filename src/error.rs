use thiserror::Error;

use crate::models::SeatRef;

/// Failures of the seat-holding service, shared by every backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("seat {seat} is no longer available")]
    Conflict { seat: SeatRef },

    #[error("seat {seat} is not held by this session")]
    NotHeld { seat: SeatRef },

    #[error("event {0} not found")]
    EventNotFound(i64),

    #[error("seat {seat} does not exist in event {event_id}")]
    UnknownSeat { event_id: i64, seat: SeatRef },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("stored data is invalid: {0}")]
    InvalidData(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Stable tag carried in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Conflict { .. } => "conflict",
            BackendError::NotHeld { .. } => "not_held",
            BackendError::EventNotFound(_) => "event_not_found",
            BackendError::UnknownSeat { .. } => "unknown_seat",
            BackendError::Validation(_) => "validation",
            BackendError::InvalidData(_) => "invalid_data",
            BackendError::Database(_) => "database",
            BackendError::Redis(_) => "redis",
            BackendError::Transport(_) => "transport",
        }
    }

    /// Seat the error is about, when there is one.
    pub fn seat(&self) -> Option<SeatRef> {
        match self {
            BackendError::Conflict { seat }
            | BackendError::NotHeld { seat }
            | BackendError::UnknownSeat { seat, .. } => Some(*seat),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}
