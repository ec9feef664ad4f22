//! Renders stored UTC instants in an event's own time zone.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

/// An IANA zone name or a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Zone {
    /// Accepts `Europe/Lisbon`, `+05:30`, `-0400`, `UTC+2`, `GMT-03:30`, `Z`.
    pub fn parse(raw: &str) -> Option<Zone> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(tz) = raw.parse::<Tz>() {
            return Some(Zone::Named(tz));
        }
        parse_offset(raw).map(Zone::Fixed)
    }

    pub fn localize(&self, instant: DateTime<Utc>) -> String {
        match self {
            Zone::Named(tz) => instant.with_timezone(tz).to_rfc3339(),
            Zone::Fixed(offset) => instant.with_timezone(offset).to_rfc3339(),
        }
    }
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let upper = raw.to_ascii_uppercase();
    let body = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);
    if body.is_empty() || body == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, digits) = if let Some(rest) = body.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = body.strip_prefix('-') {
        (-1, rest)
    } else {
        return None;
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 && digits.is_ascii() => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Local rendering of `instant` in `zone`, if both are readable.
pub fn localize(instant: &str, zone: &str) -> Option<String> {
    let instant = utils::dates::parse_instant(instant)?;
    Zone::parse(zone).map(|zone| zone.localize(instant))
}
