//! pricing.rs
//!
//! Derived price arithmetic for bundle and early-bird editors, plus
//! per-seat price resolution through section tiers.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::{Bundle, BundleQuote, BundleType, EarlyBird, Section, Tier};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("bundle has no items")]
    EmptyBundle,

    #[error("tier {0} is included with zero quantity")]
    ZeroQuantity(i64),

    #[error("tier {tier_id} of event {event_id} is unknown")]
    UnknownTier { event_id: i64, tier_id: i64 },

    #[error("price cannot be negative")]
    NegativePrice,

    #[error("single-event bundle spans {0} events")]
    SpansEvents(usize),

    #[error("multi-event bundle covers only one event")]
    SingleEventOnly,

    #[error("early-bird price must be below the regular price of {0} cents")]
    EarlyBirdNotCheaper(i64),

    #[error("bundle total is too large")]
    Overflow,
}

/// Regular price, savings and savings percentage of a bundle.
///
/// Regular price is the sum of tier price times included quantity; savings
/// percentage is rounded to the nearest whole percent and is 0 for a free
/// regular price.
pub fn quote_bundle(bundle: &Bundle, tiers: &[Tier]) -> Result<BundleQuote, PricingError> {
    if bundle.items.is_empty() {
        return Err(PricingError::EmptyBundle);
    }
    if bundle.price_cents < 0 {
        return Err(PricingError::NegativePrice);
    }

    let by_id: HashMap<(i64, i64), &Tier> = tiers.iter().map(|t| ((t.event_id, t.id), t)).collect();
    let events: HashSet<i64> = bundle.items.iter().map(|item| item.event_id).collect();

    match bundle.bundle_type {
        BundleType::SingleEvent if events.len() > 1 => return Err(PricingError::SpansEvents(events.len())),
        BundleType::SingleEvent => {}
        BundleType::MultiEvent if events.len() < 2 => return Err(PricingError::SingleEventOnly),
        BundleType::MultiEvent => {}
    }

    let mut regular_price_cents = 0i64;
    for item in &bundle.items {
        if item.quantity == 0 {
            return Err(PricingError::ZeroQuantity(item.tier_id));
        }
        let tier = by_id
            .get(&(item.event_id, item.tier_id))
            .ok_or(PricingError::UnknownTier { event_id: item.event_id, tier_id: item.tier_id })?;
        regular_price_cents = tier
            .price_cents
            .checked_mul(i64::from(item.quantity))
            .and_then(|line| regular_price_cents.checked_add(line))
            .ok_or(PricingError::Overflow)?;
    }

    let savings_cents = regular_price_cents
        .checked_sub(bundle.price_cents)
        .ok_or(PricingError::Overflow)?;
    Ok(BundleQuote {
        regular_price_cents,
        bundle_price_cents: bundle.price_cents,
        savings_cents,
        savings_percent: percent_of(savings_cents, regular_price_cents),
    })
}

pub fn validate_early_bird(tier: &Tier, early: &EarlyBird) -> Result<(), PricingError> {
    if early.price_cents < 0 {
        return Err(PricingError::NegativePrice);
    }
    if early.price_cents >= tier.price_cents {
        return Err(PricingError::EarlyBirdNotCheaper(tier.price_cents));
    }
    Ok(())
}

/// Discount shown next to an early-bird price, in whole percent.
pub fn early_bird_discount_percent(tier: &Tier) -> Option<i64> {
    tier.early_bird
        .as_ref()
        .map(|early| percent_of(tier.price_cents - early.price_cents, tier.price_cents))
}

/// Price of any seat in `section`, resolved through its tier at `now`.
pub fn resolve_section_price(section: &Section, tiers: &[Tier], now: DateTime<Utc>) -> Option<i64> {
    let tier_id = section.tier_id?;
    tiers
        .iter()
        .find(|tier| tier.id == tier_id)
        .map(|tier| tier.effective_price_cents(now))
}

fn percent_of(part: i64, whole: i64) -> i64 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BundleItem, ContainerType};
    use chrono::{Duration, TimeZone};

    fn tier(id: i64, event_id: i64, price_cents: i64) -> Tier {
        Tier { id, event_id, name: format!("tier-{}", id), price_cents, early_bird: None }
    }

    fn bundle(bundle_type: BundleType, items: Vec<BundleItem>, price_cents: i64) -> Bundle {
        Bundle { name: "combo".to_string(), bundle_type, items, price_cents }
    }

    fn item(event_id: i64, tier_id: i64, quantity: u32) -> BundleItem {
        BundleItem { event_id, tier_id, quantity }
    }

    #[test]
    fn two_tier_bundle_savings() {
        let tiers = vec![tier(1, 10, 4000), tier(2, 10, 4500)];
        let quote = quote_bundle(&bundle(BundleType::SingleEvent, vec![item(10, 1, 1), item(10, 2, 1)], 7500), &tiers).unwrap();

        assert_eq!(quote.regular_price_cents, 8500);
        assert_eq!(quote.savings_cents, 1000);
        assert_eq!(quote.savings_percent, 12);
    }

    #[test]
    fn quantity_multiplies_tier_price() {
        let tiers = vec![tier(1, 10, 2500)];
        let quote = quote_bundle(&bundle(BundleType::SingleEvent, vec![item(10, 1, 4)], 9000), &tiers).unwrap();
        assert_eq!(quote.regular_price_cents, 10000);
        assert_eq!(quote.savings_percent, 10);
    }

    #[test]
    fn free_tiers_report_zero_percent() {
        let tiers = vec![tier(1, 10, 0)];
        let quote = quote_bundle(&bundle(BundleType::SingleEvent, vec![item(10, 1, 2)], 0), &tiers).unwrap();
        assert_eq!(quote.savings_percent, 0);
    }

    #[test]
    fn bundle_type_constrains_event_spread() {
        let tiers = vec![tier(1, 10, 1000), tier(2, 20, 1000)];
        let spread = vec![item(10, 1, 1), item(20, 2, 1)];

        assert_eq!(
            quote_bundle(&bundle(BundleType::SingleEvent, spread.clone(), 1500), &tiers),
            Err(PricingError::SpansEvents(2))
        );
        assert!(quote_bundle(&bundle(BundleType::MultiEvent, spread, 1500), &tiers).is_ok());
        assert_eq!(
            quote_bundle(&bundle(BundleType::MultiEvent, vec![item(10, 1, 1)], 500), &tiers),
            Err(PricingError::SingleEventOnly)
        );
    }

    #[test]
    fn rejects_malformed_bundles() {
        let tiers = vec![tier(1, 10, 1000)];
        assert_eq!(quote_bundle(&bundle(BundleType::SingleEvent, vec![], 0), &tiers), Err(PricingError::EmptyBundle));
        assert_eq!(
            quote_bundle(&bundle(BundleType::SingleEvent, vec![item(10, 1, 0)], 0), &tiers),
            Err(PricingError::ZeroQuantity(1))
        );
        assert_eq!(
            quote_bundle(&bundle(BundleType::SingleEvent, vec![item(10, 9, 1)], 0), &tiers),
            Err(PricingError::UnknownTier { event_id: 10, tier_id: 9 })
        );
        assert_eq!(
            quote_bundle(&bundle(BundleType::SingleEvent, vec![item(10, 1, 1)], -1), &tiers),
            Err(PricingError::NegativePrice)
        );
    }

    #[test]
    fn huge_quantities_overflow_into_an_error() {
        let tiers = vec![tier(1, 10, 5_000_000_000), tier(2, 10, i64::MAX)];
        assert_eq!(
            quote_bundle(&bundle(BundleType::SingleEvent, vec![item(10, 1, u32::MAX)], 100), &tiers),
            Err(PricingError::Overflow)
        );
        assert_eq!(
            quote_bundle(&bundle(BundleType::SingleEvent, vec![item(10, 2, 1), item(10, 2, 1)], 100), &tiers),
            Err(PricingError::Overflow)
        );
    }

    #[test]
    fn early_bird_applies_until_deadline() {
        let deadline = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut t = tier(1, 10, 5000);
        t.early_bird = Some(EarlyBird { price_cents: 4000, ends_at: deadline });

        assert_eq!(t.effective_price_cents(deadline - Duration::seconds(1)), 4000);
        assert_eq!(t.effective_price_cents(deadline), 5000);
        assert_eq!(early_bird_discount_percent(&t), Some(20));
    }

    #[test]
    fn early_bird_must_be_cheaper() {
        let t = tier(1, 10, 5000);
        let ends_at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(validate_early_bird(&t, &EarlyBird { price_cents: 4999, ends_at }).is_ok());
        assert_eq!(
            validate_early_bird(&t, &EarlyBird { price_cents: 5000, ends_at }),
            Err(PricingError::EarlyBirdNotCheaper(5000))
        );
        assert_eq!(
            validate_early_bird(&t, &EarlyBird { price_cents: -5, ends_at }),
            Err(PricingError::NegativePrice)
        );
    }

    #[test]
    fn section_price_follows_tier() {
        let section = Section {
            id: 1,
            name: "Floor".to_string(),
            color: "#336699".to_string(),
            container_type: ContainerType::Tables,
            tier_id: Some(2),
            tables: vec![],
        };
        let tiers = vec![tier(1, 10, 1000), tier(2, 10, 7000)];
        assert_eq!(resolve_section_price(&section, &tiers, Utc::now()), Some(7000));
        assert_eq!(resolve_section_price(&Section { tier_id: None, ..section }, &tiers, Utc::now()), None);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn savings_add_back_to_regular_price(
                prices in proptest::collection::vec(0i64..100_000, 1..6),
                quantities in proptest::collection::vec(1u32..10, 6),
                bundle_price in 0i64..500_000,
            ) {
                let tiers: Vec<Tier> = prices.iter().enumerate().map(|(i, p)| tier(i as i64, 1, *p)).collect();
                let items: Vec<BundleItem> = tiers.iter().zip(&quantities).map(|(t, q)| item(1, t.id, *q)).collect();
                let quote = quote_bundle(&bundle(BundleType::SingleEvent, items, bundle_price), &tiers).unwrap();

                prop_assert_eq!(quote.savings_cents + quote.bundle_price_cents, quote.regular_price_cents);
                if quote.regular_price_cents > 0 && quote.savings_cents >= 0 {
                    prop_assert!(quote.savings_percent <= 100);
                }
            }
        }
    }
}
