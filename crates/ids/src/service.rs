//! Identifier generator implementations.

use crate::{IdError, IdResult};
use chrono::{Duration, NaiveDateTime};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Source of fresh record identifiers.
pub trait IdGenerator {
    /// Returns an identifier that this generator has not returned before.
    fn next_id(&mut self, now: NaiveDateTime) -> String;
}

fn validate_prefix(prefix: &str) -> IdResult<()> {
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(IdError::InvalidInput(format!(
            "identifier prefix must be non-empty ASCII alphanumeric, got: '{}'",
            prefix
        )));
    }
    Ok(())
}

/// Sequential identifiers of the form `{prefix}-{n}` with `n` zero-padded to `width`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequentialIds {
    prefix: String,
    width: usize,
    last: u64,
}

impl SequentialIds {
    /// Creates a generator whose first identifier is `{prefix}-1` (padded).
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `prefix` is empty or not ASCII alphanumeric.
    pub fn new(prefix: &str, width: usize) -> IdResult<Self> {
        validate_prefix(prefix)?;
        Ok(Self {
            prefix: prefix.to_owned(),
            width,
            last: 0,
        })
    }

    /// Advances the sequence past every identifier in `existing` that carries this prefix.
    ///
    /// Identifiers with another prefix or a non-numeric suffix are ignored.
    pub fn continuing_from<'a>(mut self, existing: impl IntoIterator<Item = &'a str>) -> Self {
        let highest = existing
            .into_iter()
            .filter_map(|id| self.parse_sequence(id))
            .max()
            .unwrap_or(0);
        self.last = self.last.max(highest);
        self
    }

    /// Extracts the sequence number from an identifier produced under this prefix.
    pub fn parse_sequence(&self, id: &str) -> Option<u64> {
        let (prefix, number) = id.split_once('-')?;
        if prefix != self.prefix || number.is_empty() {
            return None;
        }
        if !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        number.parse().ok()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self, _now: NaiveDateTime) -> String {
        self.last += 1;
        format!("{}-{:0width$}", self.prefix, self.last, width = self.width)
    }
}

/// Timestamp-derived identifiers of the form `{prefix}-{YYYYMMDDHHMMSSmmm}`.
///
/// If the clock has not moved past the previously issued timestamp, the new identifier uses the
/// previous timestamp plus one millisecond, so identifiers stay unique and ordered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampIds {
    prefix: String,
    last: Option<NaiveDateTime>,
}

impl TimestampIds {
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `prefix` is empty or not ASCII alphanumeric.
    pub fn new(prefix: &str) -> IdResult<Self> {
        validate_prefix(prefix)?;
        Ok(Self {
            prefix: prefix.to_owned(),
            last: None,
        })
    }

    /// Parses the timestamp embedded in an identifier produced under this prefix.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if the prefix does not match or the timestamp is
    /// malformed.
    pub fn parse_timestamp(&self, id: &str) -> IdResult<NaiveDateTime> {
        let (prefix, stamp) = id.split_once('-').ok_or_else(|| {
            IdError::InvalidInput(format!("Invalid timestamp identifier format: '{}'", id))
        })?;
        if prefix != self.prefix {
            return Err(IdError::InvalidInput(format!(
                "Identifier prefix '{}' does not match '{}'",
                prefix, self.prefix
            )));
        }
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).map_err(|e| {
            IdError::InvalidInput(format!("Invalid timestamp '{}': {}", stamp, e))
        })
    }
}

impl IdGenerator for TimestampIds {
    fn next_id(&mut self, now: NaiveDateTime) -> String {
        let timestamp = match self.last {
            Some(prev) if now <= prev => prev + Duration::milliseconds(1),
            _ => now,
        };
        self.last = Some(timestamp);
        format!("{}-{}", self.prefix, timestamp.format(TIMESTAMP_FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn sequential_ids_are_padded_and_increasing() {
        let mut ids = SequentialIds::new("TO", 3).unwrap();
        assert_eq!(ids.next_id(at(9, 0, 0, 0)), "TO-001");
        assert_eq!(ids.next_id(at(9, 0, 0, 0)), "TO-002");
    }

    #[test]
    fn sequential_ids_continue_after_seeded_records() {
        let seeded = ["INS-001", "INS-007", "INS-003", "RG-099", "INS-abc"];
        let mut ids = SequentialIds::new("INS", 3)
            .unwrap()
            .continuing_from(seeded.iter().copied());
        assert_eq!(ids.next_id(at(9, 0, 0, 0)), "INS-008");
    }

    #[test]
    fn sequential_ids_reject_bad_prefix() {
        assert!(SequentialIds::new("", 3).is_err());
        assert!(SequentialIds::new("T-O", 3).is_err());
    }

    #[test]
    fn timestamp_ids_bump_when_clock_stalls() {
        let mut ids = TimestampIds::new("AUD").unwrap();
        let now = at(10, 30, 0, 123);

        let first = ids.next_id(now);
        let second = ids.next_id(now);
        let third = ids.next_id(at(10, 29, 59, 0));

        assert_eq!(first, "AUD-20240115103000123");
        assert_eq!(second, "AUD-20240115103000124");
        assert_eq!(third, "AUD-20240115103000125");
    }

    #[test]
    fn timestamp_ids_round_trip_their_timestamp() {
        let mut ids = TimestampIds::new("EVT").unwrap();
        let now = at(8, 5, 9, 7);
        let id = ids.next_id(now);
        assert_eq!(ids.parse_timestamp(&id).unwrap(), now);
        assert!(ids.parse_timestamp("OTHER-20240115080509007").is_err());
        assert!(ids.parse_timestamp("EVT-notatime").is_err());
    }
}
