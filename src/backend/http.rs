//! http.rs
//!
//! `SeatBackend` over the REST surface of a remote seat-holding service.
//! There is no retry policy: a failed call is reported once and the caller
//! decides what to do.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

use super::SeatBackend;
use crate::error::BackendError;
use crate::models::wire::{
    CleanupResponse, ErrorBody, HoldRequest, PurchaseResponse, ReleaseRequest, ReleaseResponse,
};
use crate::models::{HoldReceipt, SeatRef, SeatingChart, SessionId, Tier};

#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(base_url, http_client))
    }

    pub fn with_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http_client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, event_id: i64, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request.send().await.inspect_err(|e| {
            error!("Seat service request failed: {:?}", e);
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.json::<ErrorBody>().await.ok();
        debug!("Seat service answered {} for event {}: {:?}", status, event_id, body);
        Err(error_from_response(event_id, status, body))
    }
}

/// Rebuilds a `BackendError` from a non-success response.
pub(crate) fn error_from_response(event_id: i64, status: StatusCode, body: Option<ErrorBody>) -> BackendError {
    let (kind, message, seat) = match body {
        Some(body) => (body.kind, body.message, body.seat),
        None => (String::new(), status.to_string(), None),
    };

    match (status, kind.as_str(), seat) {
        (StatusCode::CONFLICT, "not_held", Some(seat)) => BackendError::NotHeld { seat },
        (StatusCode::CONFLICT, _, Some(seat)) => BackendError::Conflict { seat },
        (StatusCode::NOT_FOUND, "unknown_seat", Some(seat)) => BackendError::UnknownSeat { event_id, seat },
        (StatusCode::NOT_FOUND, _, _) => BackendError::EventNotFound(event_id),
        (StatusCode::BAD_REQUEST, _, _) | (StatusCode::UNPROCESSABLE_ENTITY, _, _) => BackendError::Validation(message),
        _ => BackendError::Transport(format!("{}: {}", status, message)),
    }
}

#[async_trait]
impl SeatBackend for HttpBackend {
    async fn hold_seats_for_session(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<HoldReceipt, BackendError> {
        let body = HoldRequest { session_id: session_id.to_string(), seats: seats.to_vec() };
        let request = self
            .http_client
            .post(self.url(&format!("/events/{}/holds", event_id)))
            .json(&body);
        self.send(event_id, request).await
    }

    async fn release_session_holds(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: Option<&[SeatRef]>,
    ) -> Result<usize, BackendError> {
        let body = ReleaseRequest { session_id: session_id.to_string(), seats: seats.map(<[SeatRef]>::to_vec) };
        let request = self
            .http_client
            .post(self.url(&format!("/events/{}/holds/release", event_id)))
            .json(&body);
        let response: ReleaseResponse = self.send(event_id, request).await?;
        Ok(response.released)
    }

    async fn cleanup_expired_session_holds(&self, event_id: i64) -> Result<usize, BackendError> {
        let request = self
            .http_client
            .post(self.url(&format!("/events/{}/holds/cleanup", event_id)));
        let response: CleanupResponse = self.send(event_id, request).await?;
        Ok(response.reclaimed)
    }

    async fn get_public_seating_chart(&self, event_id: i64) -> Result<SeatingChart, BackendError> {
        let request = self.http_client.get(self.url(&format!("/events/{}/chart", event_id)));
        self.send(event_id, request).await
    }

    async fn get_event_ticket_tiers(&self, event_id: i64) -> Result<Vec<Tier>, BackendError> {
        let request = self.http_client.get(self.url(&format!("/events/{}/tiers", event_id)));
        self.send(event_id, request).await
    }

    async fn complete_purchase(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<Vec<SeatRef>, BackendError> {
        let body = HoldRequest { session_id: session_id.to_string(), seats: seats.to_vec() };
        let request = self
            .http_client
            .post(self.url(&format!("/events/{}/purchases", event_id)))
            .json(&body);
        let response: PurchaseResponse = self.send(event_id, request).await?;
        Ok(response.sold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(kind: &str, seat: Option<SeatRef>) -> Option<ErrorBody> {
        Some(ErrorBody { kind: kind.to_string(), message: "nope".to_string(), seat })
    }

    #[test]
    fn maps_conflicts_with_their_seat() {
        let seat = SeatRef::new(4, 2);
        assert!(matches!(
            error_from_response(1, StatusCode::CONFLICT, body("conflict", Some(seat))),
            BackendError::Conflict { seat: s } if s == seat
        ));
        assert!(matches!(
            error_from_response(1, StatusCode::CONFLICT, body("not_held", Some(seat))),
            BackendError::NotHeld { .. }
        ));
    }

    #[test]
    fn unreadable_bodies_become_transport_errors() {
        assert!(matches!(
            error_from_response(1, StatusCode::BAD_GATEWAY, None),
            BackendError::Transport(_)
        ));
        assert!(matches!(
            error_from_response(1, StatusCode::CONFLICT, None),
            BackendError::Transport(_)
        ));
        assert!(matches!(
            error_from_response(3, StatusCode::NOT_FOUND, None),
            BackendError::EventNotFound(3)
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let backend = HttpBackend::with_client("http://seats.local/", reqwest::Client::new());
        assert_eq!(backend.url("/events/1/chart"), "http://seats.local/api/events/1/chart");
    }
}
