//! Timeline value types.
//!
//! Instants are carried as [`Timestamp`] (UTC). Calendar dates and
//! segment identifiers are wall-clock values; they become instants through
//! the site's fixed UTC offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Absolute instant used for coverage intervals and fragment timestamps.
pub type Timestamp = DateTime<Utc>;

/// Milliseconds in one calendar day; offsets live in `[0, MS_PER_DAY)`.
pub const MS_PER_DAY: u32 = 86_400_000;

/// Shared scrubber position: a calendar date plus an offset into that day.
///
/// Crossing midnight is never rolled over implicitly; callers change the
/// date explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct TimelinePosition {
    date: NaiveDate,
    offset_ms: u32,
}

#[derive(Deserialize)]
struct RawPosition {
    date: NaiveDate,
    offset_ms: u32,
}

impl TryFrom<RawPosition> for TimelinePosition {
    type Error = Error;

    fn try_from(raw: RawPosition) -> Result<Self> {
        Self::new(raw.date, raw.offset_ms)
    }
}

impl TimelinePosition {
    /// Create a position, rejecting offsets outside the day.
    pub fn new(date: NaiveDate, offset_ms: u32) -> Result<Self> {
        if offset_ms >= MS_PER_DAY {
            return Err(Error::invalid_input(format!(
                "offset {offset_ms}ms is outside one day"
            )));
        }
        Ok(Self { date, offset_ms })
    }

    /// Midnight of `date`.
    pub fn start_of(date: NaiveDate) -> Self {
        Self { date, offset_ms: 0 }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn offset_ms(&self) -> u32 {
        self.offset_ms
    }

    /// Same date, different offset.
    pub fn with_offset(&self, offset_ms: u32) -> Result<Self> {
        Self::new(self.date, offset_ms)
    }

    /// Wall-clock date-time this position denotes.
    pub fn local(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN) + Duration::milliseconds(i64::from(self.offset_ms))
    }

    /// Absolute instant for this position at the given site offset.
    pub fn absolute(&self, offset: FixedOffset) -> Timestamp {
        local_to_utc(self.local(), offset)
    }

    /// Parse `HH:MM[:SS[.mmm]]` into an offset within the day.
    pub fn parse_time_of_day(s: &str) -> Result<u32> {
        let s = s.trim();
        let time = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
            .ok_or_else(|| Error::invalid_input(format!("not a time of day: {s}")))?;
        let offset = time.signed_duration_since(NaiveTime::MIN).num_milliseconds();
        u32::try_from(offset).map_err(|_| Error::invalid_input(format!("not a time of day: {s}")))
    }
}

impl fmt::Display for TimelinePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Interpret a wall-clock date-time at a fixed offset.
pub fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> Timestamp {
    // A fixed offset has no gaps or folds, so the mapping is always single.
    match offset.from_local_datetime(&local) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        _ => Utc.from_utc_datetime(&(local - offset)),
    }
}

/// A sub-chunk of a loaded segment, as reported by the playback engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Absolute wall-clock time of the fragment's first frame.
    pub program_date_time: Timestamp,
    /// Position of the fragment within the segment's media, in seconds.
    pub start_secs: f64,
}

impl Fragment {
    pub fn new(program_date_time: Timestamp, start_secs: f64) -> Self {
        Self {
            program_date_time,
            start_secs,
        }
    }
}
