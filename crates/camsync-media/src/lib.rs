//! Camsync-Media: HLS media playlist parsing.
//!
//! Recorders write one media playlist per hour bucket, with
//! `#EXT-X-PROGRAM-DATE-TIME` tags stamping wall-clock time onto the
//! fragments. This crate turns that text into a [`MediaPlaylist`] whose
//! [`timed_entries`](MediaPlaylist::timed_entries) give each fragment its
//! offset inside the segment and its absolute program date-time.
//!
//! # Example
//!
//! ```
//! use camsync_media::MediaPlaylist;
//!
//! let text = "#EXTM3U\n\
//!     #EXT-X-TARGETDURATION:10\n\
//!     #EXT-X-PROGRAM-DATE-TIME:2024-05-01T09:00:00.000+0000\n\
//!     #EXTINF:10.0,\nsegment_000.ts\n\
//!     #EXTINF:10.0,\nsegment_001.ts\n\
//!     #EXT-X-ENDLIST\n";
//!
//! let playlist = MediaPlaylist::parse(text).unwrap();
//! assert_eq!(playlist.total_duration(), 20.0);
//! let entries = playlist.timed_entries();
//! assert_eq!(entries[1].start_secs, 10.0);
//! assert!(entries[1].program_date_time.is_some());
//! ```

pub mod error;
pub mod hls;

pub use error::{Error, Result};
pub use hls::{MediaPlaylist, PlaylistType, SegmentEntry, TimedEntry};
