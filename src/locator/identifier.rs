//! Segment identifier parsing.

use camsync_common::{Error, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

/// Layout of the timestamp recorders embed in segment directory names.
pub const IDENTIFIER_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

fn stamp_regex() -> &'static Regex {
    static STAMP: OnceLock<Regex> = OnceLock::new();
    STAMP.get_or_init(|| {
        Regex::new(r"(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})").expect("valid stamp regex")
    })
}

/// Extract the wall-clock start time embedded in a segment identifier.
///
/// The first `YYYY-MM-DD_HH-MM-SS` run is used. Identifiers without one, or
/// whose digits do not form a real date-time, are malformed.
pub fn parse_identifier(identifier: &str) -> Result<NaiveDateTime> {
    let stamp = stamp_regex()
        .find(identifier)
        .ok_or_else(|| Error::MalformedSegmentIdentifier(identifier.to_string()))?;

    NaiveDateTime::parse_from_str(stamp.as_str(), IDENTIFIER_FORMAT)
        .map_err(|_| Error::MalformedSegmentIdentifier(identifier.to_string()))
}
