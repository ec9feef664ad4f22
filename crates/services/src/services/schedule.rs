//! Status of records that are only valid inside a date window (ads,
//! insurance policies).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::dates::Stamp;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, EnumString,
)]
pub enum WindowStatus {
    Active,
    Inactive,
}

/// `Active` iff `start <= reference <= end`, both bounds inclusive. A
/// date-only end bound covers its whole day. Missing or unreadable bounds are
/// `Inactive`.
pub fn derive_status(start: Option<&str>, end: Option<&str>, reference: DateTime<Utc>) -> WindowStatus {
    let (Some(start), Some(end)) = (start.and_then(Stamp::parse), end.and_then(Stamp::parse)) else {
        return WindowStatus::Inactive;
    };
    if start.start() <= reference && end.covers_up_to(reference) {
        WindowStatus::Active
    } else {
        WindowStatus::Inactive
    }
}
