//! Date and timestamp handling for record fields.
//!
//! Seeded records carry loosely formatted timestamp strings. Everything that needs a date
//! (range filters, timestamp sorting, age calculation) goes through [`parse_timestamp`], which
//! returns `None` for anything it cannot read. Callers decide explicitly what an unreadable date
//! means for them; range filters exclude such records.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};

/// Format used when the dashboards stamp a record with the current time.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parses a record timestamp.
///
/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD HH:MM[:SS[.fff]]`, the same with a `T`
/// separator, `MM/DD/YYYY [HH:MM[:SS]]`, and bare dates (`YYYY-MM-DD`, `MM/DD/YYYY`,
/// `YYYY/MM/DD`) taken as midnight.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parses the calendar date of a record timestamp.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    parse_timestamp(input).map(|ts| ts.date())
}

/// Strict `YYYY-MM-DD` check used by form validation.
pub fn is_iso_date(input: &str) -> bool {
    let input = input.trim();
    input.len() == 10 && NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok()
}

/// Formats a timestamp the way new records are stamped.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(DISPLAY_FORMAT).to_string()
}

/// Current local wall-clock time.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Completed years between `dob` and `on`. Zero when `on` precedes `dob`.
pub fn age_on(dob: NaiveDate, on: NaiveDate) -> u32 {
    if on < dob {
        return 0;
    }
    let mut years = on.year() - dob.year();
    if (on.month(), on.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}
