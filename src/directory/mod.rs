//! Directory listing service clients.
//!
//! Recorders lay segments out as one directory per hour bucket, named after
//! the bucket's start time (`cam1/2024-05-01_09-00-00/playlist.m3u8`). A
//! [`DirectoryService`] returns the raw entry names for a camera; parsing and
//! filtering them is the [`SegmentLocator`](crate::locator::SegmentLocator)'s
//! job.

mod fs;
mod http;

pub use fs::FsDirectory;
pub use http::HttpDirectory;

use async_trait::async_trait;
use camsync_common::{CameraId, Result};
use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::{DirectoryConfig, DirectoryKind};

/// Raw listing for one camera and date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Location segment directories live under (URL or filesystem path).
    pub base: String,
    /// Playlist file name inside each segment directory.
    pub playlist_name: String,
    /// Entry names as listed, unparsed.
    pub identifiers: Vec<String>,
}

impl DirectoryListing {
    /// Playlist location for one listed identifier.
    pub fn source_url(&self, identifier: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base.trim_end_matches('/'),
            identifier.trim_matches('/'),
            self.playlist_name
        )
    }
}

/// Source of segment identifiers for a camera.
///
/// Implementations report transport problems as
/// [`Error::DirectoryUnreachable`](camsync_common::Error::DirectoryUnreachable);
/// an existing but empty directory is an empty listing.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// List the segment directories recorded by `camera` on `date`.
    ///
    /// Implementations may return entries from other dates as well; callers
    /// filter on the parsed timestamp.
    async fn list(&self, camera: CameraId, date: NaiveDate) -> Result<DirectoryListing>;
}

/// Create the configured directory client.
pub fn create_directory(config: &DirectoryConfig) -> Arc<dyn DirectoryService> {
    match config.kind {
        DirectoryKind::Http => Arc::new(HttpDirectory::new(config)),
        DirectoryKind::Fs => Arc::new(FsDirectory::new(config)),
    }
}

/// Keep only entries that could belong to `date`.
fn on_date(name: &str, date: NaiveDate) -> bool {
    name.starts_with(&date.format("%Y-%m-%d").to_string())
}
