use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::chart::SeatRef;

/// Identifier of one browsing visit. Generated by the client, never persisted as identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Granted hold returned by the seat-holding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldReceipt {
    pub event_id: i64,
    pub session_id: SessionId,
    pub seats: Vec<SeatRef>,
    pub expires_at: DateTime<Utc>,
}

/// A seat the client intends to purchase. Exists only after the hold was granted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSeat {
    pub table_id: i64,
    pub table_number: i32,
    pub seat_number: i32,
    pub seat_type: super::chart::SeatType,
    pub price_cents: Option<i64>,
}

impl SelectedSeat {
    pub fn id(&self) -> SeatRef {
        SeatRef::new(self.table_id, self.seat_number)
    }
}
