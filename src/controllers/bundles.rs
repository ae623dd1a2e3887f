use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{backend_error, bad_request, validate, ApiError};
use crate::models::Bundle;
use crate::pricing::quote_bundle;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/bundles/quote", post(quote))
}

// POST /api/bundles/quote
async fn quote(
    State(state): State<Arc<AppState>>,
    Json(bundle): Json<Bundle>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&bundle)?;
    let events: BTreeSet<i64> = bundle.items.iter().map(|item| item.event_id).collect();

    let mut tiers = Vec::new();
    for event_id in events {
        let event_tiers = state
            .backend
            .get_event_ticket_tiers(event_id)
            .await
            .map_err(backend_error)?;
        tiers.extend(event_tiers);
    }

    let quote = quote_bundle(&bundle, &tiers).map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(quote))
}
