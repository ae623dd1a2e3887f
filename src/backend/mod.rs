//! The seat-holding contract and its implementations.
//!
//! The server owns seat status. Every implementation here arbitrates holds so
//! that at most one session holds a seat at a time, and treats holds whose
//! expiry has passed as available even before a sweep reclaims them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::BackendError;
use crate::models::{HoldReceipt, SeatRef, SeatingChart, SessionId, Tier};

pub mod http;
pub mod memory;
pub mod persistent;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;
pub use persistent::PersistentBackend;

/// Upper bound on seats in one hold or purchase request.
pub const MAX_SEATS_PER_REQUEST: usize = 64;

#[async_trait]
pub trait SeatBackend: Send + Sync {
    /// Holds every seat for the session or none of them.
    async fn hold_seats_for_session(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<HoldReceipt, BackendError>;

    /// Releases the session's holds on `seats`, or all of its holds for `None`.
    /// Seats the session does not hold are ignored.
    async fn release_session_holds(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: Option<&[SeatRef]>,
    ) -> Result<usize, BackendError>;

    /// Returns every expired hold of the event to AVAILABLE, whoever owns it.
    async fn cleanup_expired_session_holds(&self, event_id: i64) -> Result<usize, BackendError>;

    async fn get_public_seating_chart(&self, event_id: i64) -> Result<SeatingChart, BackendError>;

    async fn get_event_ticket_tiers(&self, event_id: i64) -> Result<Vec<Tier>, BackendError>;

    /// Converts seats the session currently holds into SOLD.
    async fn complete_purchase(
        &self,
        event_id: i64,
        session_id: &SessionId,
        seats: &[SeatRef],
    ) -> Result<Vec<SeatRef>, BackendError>;

    /// Events this backend can sweep.
    async fn known_events(&self) -> Result<Vec<i64>, BackendError> {
        Ok(Vec::new())
    }
}

pub(crate) fn check_seat_list(seats: &[SeatRef]) -> Result<(), BackendError> {
    if seats.is_empty() {
        return Err(BackendError::Validation("at least one seat is required".to_string()));
    }
    if seats.len() > MAX_SEATS_PER_REQUEST {
        return Err(BackendError::Validation(format!(
            "at most {} seats per request",
            MAX_SEATS_PER_REQUEST
        )));
    }
    Ok(())
}

/// `now + ttl`, refusing TTLs that are not positive or run past the calendar.
pub(crate) fn hold_expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, BackendError> {
    if ttl <= Duration::zero() {
        return Err(BackendError::Validation(format!("hold ttl must be positive, got {}", ttl)));
    }
    now.checked_add_signed(ttl)
        .ok_or_else(|| BackendError::Validation(format!("hold ttl {} is out of range", ttl)))
}

/// Sorted, duplicate-free copy of a seat list.
pub(crate) fn dedup_seats(seats: &[SeatRef]) -> Vec<SeatRef> {
    let mut unique = seats.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hold_expiry_never_overflows() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 19, 0, 0).unwrap();
        assert_eq!(hold_expiry(now, Duration::minutes(5)).unwrap(), now + Duration::minutes(5));
        assert!(matches!(hold_expiry(now, Duration::seconds(-1)), Err(BackendError::Validation(_))));
        assert!(matches!(hold_expiry(now, Duration::zero()), Err(BackendError::Validation(_))));
        assert!(matches!(
            hold_expiry(now, Duration::seconds(10_000_000_000_000)),
            Err(BackendError::Validation(_))
        ));
    }
}
