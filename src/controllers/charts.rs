use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use super::{backend_error, ApiError};
use crate::layout::render_svg;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{event_id}/chart", get(get_chart))
        .route("/events/{event_id}/chart.svg", get(get_chart_svg))
        .route("/events/{event_id}/tiers", get(get_tiers))
}

// GET /api/events/{event_id}/chart
async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let chart = state
        .backend
        .get_public_seating_chart(event_id)
        .await
        .map_err(backend_error)?;
    Ok(Json(chart))
}

// GET /api/events/{event_id}/chart.svg
async fn get_chart_svg(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let chart = state
        .backend
        .get_public_seating_chart(event_id)
        .await
        .map_err(backend_error)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], render_svg(&chart)))
}

// GET /api/events/{event_id}/tiers
async fn get_tiers(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let tiers = state
        .backend
        .get_event_ticket_tiers(event_id)
        .await
        .map_err(backend_error)?;
    Ok(Json(tiers))
}
