//! Vendor ad pricing. Amounts are in cents.

use db::models::ad::AdPlacement;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

pub const MAX_WEEKS: u32 = 52;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("an ad runs for 1 to {MAX_WEEKS} weeks, got {0}")]
    Duration(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct AdQuote {
    pub placement: AdPlacement,
    pub weeks: u32,
    pub weekly_rate_cents: u64,
    pub discount_percent: u8,
    pub subtotal_cents: u64,
    pub total_cents: u64,
}

pub fn weekly_rate_cents(placement: AdPlacement) -> u64 {
    match placement {
        AdPlacement::Homepage => 15_000,
        AdPlacement::Featured => 9_000,
        AdPlacement::Category => 6_000,
        AdPlacement::Newsletter => 4_000,
    }
}

pub fn discount_percent(weeks: u32) -> u8 {
    match weeks {
        12.. => 20,
        4.. => 10,
        _ => 0,
    }
}

pub fn quote(placement: AdPlacement, weeks: u32) -> Result<AdQuote, PricingError> {
    if !(1..=MAX_WEEKS).contains(&weeks) {
        return Err(PricingError::Duration(weeks));
    }
    let weekly_rate_cents = weekly_rate_cents(placement);
    let discount_percent = discount_percent(weeks);
    let subtotal_cents = weekly_rate_cents * u64::from(weeks);
    let total_cents = subtotal_cents * u64::from(100 - discount_percent) / 100;
    Ok(AdQuote {
        placement,
        weeks,
        weekly_rate_cents,
        discount_percent,
        subtotal_cents,
        total_cents,
    })
}
