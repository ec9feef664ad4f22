//! Lenient parsing for the timestamp shapes found in marketplace rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A stored date or timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// `YYYY-MM-DD`, meaning the whole calendar day.
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl Stamp {
    pub fn parse(raw: &str) -> Option<Stamp> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(Stamp::Instant(instant.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(Stamp::Instant(naive.and_utc()));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(Stamp::Day)
    }

    /// First instant covered.
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            Stamp::Day(day) => day.and_time(NaiveTime::default()).and_utc(),
            Stamp::Instant(instant) => *instant,
        }
    }

    /// UTC calendar day.
    pub fn day(&self) -> NaiveDate {
        match self {
            Stamp::Day(day) => *day,
            Stamp::Instant(instant) => instant.date_naive(),
        }
    }

    /// True when `instant` is at or before the end of this stamp; a day
    /// stamp extends to the end of that day.
    pub fn covers_up_to(&self, instant: DateTime<Utc>) -> bool {
        match self {
            Stamp::Day(day) => instant.date_naive() <= *day,
            Stamp::Instant(end) => instant <= *end,
        }
    }
}

pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    Stamp::parse(raw).map(|stamp| stamp.day())
}

pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    Stamp::parse(raw).map(|stamp| stamp.start())
}
