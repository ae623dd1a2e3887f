//! Bodies exchanged over the REST surface, shared by the controllers and `HttpBackend`.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::chart::SeatRef;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HoldRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(length(min = 1, max = 64))]
    pub seats: Vec<SeatRef>,
}

/// `seats: None` releases every hold of the session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReleaseRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub seats: Option<Vec<SeatRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub released: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub reclaimed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub sold: Vec<SeatRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<SeatRef>,
}
