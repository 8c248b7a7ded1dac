//! HLS media playlists.
//!
//! Parsing and rendering of M3U8 media playlists.

mod playlist;

pub use playlist::{MediaPlaylist, PlaylistType, SegmentEntry, TimedEntry};
