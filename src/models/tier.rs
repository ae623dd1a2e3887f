use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyBird {
    pub price_cents: i64,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub early_bird: Option<EarlyBird>,
}

impl Tier {
    /// Early-bird price until its deadline, the regular price afterwards.
    pub fn effective_price_cents(&self, now: DateTime<Utc>) -> i64 {
        match &self.early_bird {
            Some(early) if now < early.ends_at => early.price_cents,
            _ => self.price_cents,
        }
    }
}
