use camsync_common::{Error, Fragment, Result, Timestamp};

/// Offset, in seconds, of the fragment whose program date-time is closest to
/// `target`.
///
/// The list need not be sorted; on equal distance the earlier entry wins.
/// An empty list means the manifest has not been parsed yet and yields
/// [`Error::NotReady`].
pub fn seek(fragments: &[Fragment], target: Timestamp) -> Result<f64> {
    fragments
        .iter()
        .min_by_key(|f| (f.program_date_time - target).num_milliseconds().abs())
        .map(|f| f.start_secs)
        .ok_or_else(|| Error::not_ready("no fragments for the loaded segment"))
}
