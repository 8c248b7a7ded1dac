use camsync_common::Timestamp;

use crate::locator::Segment;

/// Select the segment whose coverage interval contains `target`.
///
/// Only containing segments are candidates; if several overlap, the one
/// starting closest to `target` wins (first in index order on ties). A target
/// outside every interval resolves to `None`, even with a recording nearby.
pub fn resolve(segments: &[Segment], target: Timestamp) -> Option<&Segment> {
    segments
        .iter()
        .filter(|s| s.contains(target))
        .min_by_key(|s| (target - s.coverage_start).num_milliseconds().abs())
}
