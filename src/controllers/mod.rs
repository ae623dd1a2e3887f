pub mod bundles;
pub mod charts;
pub mod holds;

use axum::{http::StatusCode, Json, Router};
use std::sync::Arc;
use validator::Validate;

use crate::error::BackendError;
use crate::models::wire::ErrorBody;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(charts::routes())
        .merge(holds::routes())
        .merge(bundles::routes())
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorBody>);

fn error_body(kind: &str, message: impl Into<String>, seat: Option<crate::models::SeatRef>) -> Json<ErrorBody> {
    Json(ErrorBody { kind: kind.to_string(), message: message.into(), seat })
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, error_body("validation", message, None))
}

pub(crate) fn validate<T: Validate>(body: &T) -> Result<(), ApiError> {
    body.validate().map_err(|e| bad_request(e.to_string()))
}

pub(crate) fn backend_error(err: BackendError) -> ApiError {
    let status = match &err {
        BackendError::Conflict { .. } | BackendError::NotHeld { .. } => StatusCode::CONFLICT,
        BackendError::EventNotFound(_) | BackendError::UnknownSeat { .. } => StatusCode::NOT_FOUND,
        BackendError::Validation(_) => StatusCode::BAD_REQUEST,
        BackendError::Transport(_) => StatusCode::BAD_GATEWAY,
        BackendError::InvalidData(_) | BackendError::Database(_) | BackendError::Redis(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        tracing::error!("seat backend error: {:?}", err);
        // storage details stay in the log
        return (status, error_body(err.kind(), "Seat service is temporarily unavailable", None));
    }
    (status, error_body(err.kind(), err.to_string(), err.seat()))
}
