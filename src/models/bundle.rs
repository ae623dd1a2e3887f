use serde::{Deserialize, Serialize};
use validator::Validate;

/// Bounds for quote requests. Each distinct event costs one tier lookup.
pub const MAX_BUNDLE_ITEMS: u64 = 20;
pub const MAX_ITEM_QUANTITY: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleType {
    SingleEvent,
    MultiEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BundleItem {
    pub event_id: i64,
    pub tier_id: i64,
    #[validate(range(min = 1, max = MAX_ITEM_QUANTITY))]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Bundle {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub bundle_type: BundleType,
    #[validate(length(min = 1, max = MAX_BUNDLE_ITEMS), nested)]
    pub items: Vec<BundleItem>,
    #[validate(range(min = 0))]
    pub price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleQuote {
    pub regular_price_cents: i64,
    pub bundle_price_cents: i64,
    pub savings_cents: i64,
    pub savings_percent: i64,
}
