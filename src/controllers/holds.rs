use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use super::{backend_error, validate, ApiError};
use crate::models::wire::{CleanupResponse, HoldRequest, PurchaseResponse, ReleaseRequest, ReleaseResponse};
use crate::models::SessionId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{event_id}/holds", post(hold_seats))
        .route("/events/{event_id}/holds/release", post(release_seats))
        .route("/events/{event_id}/holds/cleanup", post(cleanup_expired))
        .route("/events/{event_id}/purchases", post(complete_purchase))
}

// POST /api/events/{event_id}/holds
async fn hold_seats(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Json(req): Json<HoldRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req)?;
    let session_id = SessionId::from(req.session_id);

    let receipt = state
        .backend
        .hold_seats_for_session(event_id, &session_id, &req.seats)
        .await
        .map_err(backend_error)?;
    Ok((StatusCode::OK, Json(receipt)))
}

// POST /api/events/{event_id}/holds/release
async fn release_seats(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Json(req): Json<ReleaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req)?;
    let session_id = SessionId::from(req.session_id);

    let released = state
        .backend
        .release_session_holds(event_id, &session_id, req.seats.as_deref())
        .await
        .map_err(backend_error)?;
    Ok((StatusCode::OK, Json(ReleaseResponse { released })))
}

// POST /api/events/{event_id}/holds/cleanup
async fn cleanup_expired(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let reclaimed = state
        .backend
        .cleanup_expired_session_holds(event_id)
        .await
        .map_err(backend_error)?;
    Ok((StatusCode::OK, Json(CleanupResponse { reclaimed })))
}

// POST /api/events/{event_id}/purchases
async fn complete_purchase(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Json(req): Json<HoldRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req)?;
    let session_id = SessionId::from(req.session_id);

    let sold = state
        .backend
        .complete_purchase(event_id, &session_id, &req.seats)
        .await
        .map_err(backend_error)?;
    Ok((StatusCode::OK, Json(PurchaseResponse { sold })))
}
