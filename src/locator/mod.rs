//! Segment location.
//!
//! Turns a camera's directory listing into an ordered [`SegmentIndex`] of
//! hour buckets, memoized per camera and date.

mod identifier;

pub use identifier::{parse_identifier, IDENTIFIER_FORMAT};

use camsync_common::{local_to_utc, CameraId, Timestamp};
use chrono::{FixedOffset, NaiveDate};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::directory::{DirectoryListing, DirectoryService};

/// One recorded bucket for one camera.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub camera: CameraId,
    /// Directory name as listed.
    pub identifier: String,
    pub coverage_start: Timestamp,
    /// `coverage_start` plus the bucket length (exclusive).
    pub coverage_end: Timestamp,
    /// Playlist location handed to the playback engine.
    pub source_url: String,
    /// Sum of declared fragment durations, once the manifest is known.
    pub duration_secs: Option<f64>,
}

impl Segment {
    /// Whether `instant` falls in `[coverage_start, coverage_end)`.
    pub fn contains(&self, instant: Timestamp) -> bool {
        self.coverage_start <= instant && instant < self.coverage_end
    }

    /// Whole-bucket MP4 next to the playlist, as recorders export it.
    pub fn download_url(&self) -> String {
        match self.source_url.rsplit_once('/') {
            Some((dir, file)) if file.ends_with(".m3u8") => format!("{}/recording.mp4", dir),
            _ => self.source_url.clone(),
        }
    }
}

/// Ordered segments for one camera and date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentIndex {
    pub camera: CameraId,
    pub date: NaiveDate,
    segments: Vec<Segment>,
}

impl SegmentIndex {
    pub fn empty(camera: CameraId, date: NaiveDate) -> Self {
        Self {
            camera,
            date,
            segments: Vec::new(),
        }
    }

    /// Parse a listing into an index.
    ///
    /// Identifiers without a valid timestamp, or stamped with another date,
    /// are dropped. The result is sorted by `coverage_start`, then by
    /// identifier.
    pub fn from_listing(
        camera: CameraId,
        date: NaiveDate,
        listing: &DirectoryListing,
        offset: FixedOffset,
        bucket: chrono::Duration,
    ) -> Self {
        let mut segments: Vec<Segment> = listing
            .identifiers
            .iter()
            .filter_map(|identifier| {
                let local = match parse_identifier(identifier) {
                    Ok(local) => local,
                    Err(e) => {
                        tracing::trace!(camera = %camera, "Skipping listing entry: {}", e);
                        return None;
                    }
                };
                if local.date() != date {
                    return None;
                }
                let coverage_start = local_to_utc(local, offset);
                Some(Segment {
                    camera,
                    identifier: identifier.trim_end_matches('/').to_string(),
                    coverage_start,
                    coverage_end: coverage_start + bucket,
                    source_url: listing.source_url(identifier),
                    duration_secs: None,
                })
            })
            .collect();

        segments.sort_by(|a, b| {
            a.coverage_start
                .cmp(&b.coverage_start)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });

        Self {
            camera,
            date,
            segments,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segment following the one served from `source_url`.
    pub fn next_after(&self, source_url: &str) -> Option<&Segment> {
        let pos = self.segments.iter().position(|s| s.source_url == source_url)?;
        self.segments.get(pos + 1)
    }
}

type IndexCell = Arc<OnceCell<Arc<SegmentIndex>>>;

/// Memoizing segment locator.
///
/// Concurrent lookups for the same camera and date share one directory
/// request. Failed requests are not memoized, so the next lookup retries.
pub struct SegmentLocator {
    directory: Arc<dyn DirectoryService>,
    offset: FixedOffset,
    bucket: chrono::Duration,
    cache: DashMap<(CameraId, NaiveDate), IndexCell>,
}

impl SegmentLocator {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        offset: FixedOffset,
        bucket: chrono::Duration,
    ) -> Self {
        Self {
            directory,
            offset,
            bucket,
            cache: DashMap::new(),
        }
    }

    /// Segments recorded by `camera` on `date`.
    ///
    /// Never fails: an unreachable directory yields an empty index.
    pub async fn locate(&self, camera: CameraId, date: NaiveDate) -> Arc<SegmentIndex> {
        let cell = self.cache.entry((camera, date)).or_default().clone();

        let result = cell
            .get_or_try_init(|| async {
                let listing = self.directory.list(camera, date).await?;
                let index =
                    SegmentIndex::from_listing(camera, date, &listing, self.offset, self.bucket);
                tracing::debug!(
                    camera = %camera,
                    date = %date,
                    listed = listing.identifiers.len(),
                    segments = index.len(),
                    "Built segment index"
                );
                Ok::<_, camsync_common::Error>(Arc::new(index))
            })
            .await;

        match result {
            Ok(index) => Arc::clone(index),
            Err(e) => {
                tracing::warn!(camera = %camera, date = %date, "No listing: {}", e);
                Arc::new(SegmentIndex::empty(camera, date))
            }
        }
    }

    /// Index already built for `camera` and `date`, without fetching.
    pub fn cached(&self, camera: CameraId, date: NaiveDate) -> Option<Arc<SegmentIndex>> {
        self.cache
            .get(&(camera, date))
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Drop the memoized index for one camera and date.
    pub fn invalidate(&self, camera: CameraId, date: NaiveDate) {
        self.cache.remove(&(camera, date));
    }

    /// Drop every memoized index.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use camsync_common::{Error, Result};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDirectory {
        identifiers: Vec<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl CountingDirectory {
        fn new(identifiers: Vec<&'static str>) -> Self {
            Self {
                identifiers,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DirectoryService for CountingDirectory {
        async fn list(&self, camera: CameraId, _date: NaiveDate) -> Result<DirectoryListing> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(Error::directory_unreachable(camera, "connection refused"));
            }
            Ok(DirectoryListing {
                base: format!("http://nvr/cam{}", camera),
                playlist_name: "playlist.m3u8".to_string(),
                identifiers: self.identifiers.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    fn cam(n: u8) -> CameraId {
        CameraId::new(n).unwrap()
    }

    fn may_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn listing(ids: &[&str]) -> DirectoryListing {
        DirectoryListing {
            base: "http://nvr/cam1".to_string(),
            playlist_name: "playlist.m3u8".to_string(),
            identifiers: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_index_sorted_and_filtered() {
        let index = SegmentIndex::from_listing(
            cam(1),
            may_first(),
            &listing(&[
                "2024-05-01_10-00-00",
                "garbage",
                "2024-05-01_09-00-00",
                "2024-04-30_23-00-00",
                "2024-05-01_99-00-00",
            ]),
            utc(),
            chrono::Duration::hours(1),
        );

        let ids: Vec<&str> = index.segments().iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(ids, vec!["2024-05-01_09-00-00", "2024-05-01_10-00-00"]);

        let first = &index.segments()[0];
        assert_eq!(
            first.coverage_start,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
        );
        assert_eq!(
            first.coverage_end,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            first.source_url,
            "http://nvr/cam1/2024-05-01_09-00-00/playlist.m3u8"
        );
    }

    #[test]
    fn test_index_applies_site_offset() {
        let index = SegmentIndex::from_listing(
            cam(1),
            may_first(),
            &listing(&["2024-05-01_09-00-00"]),
            FixedOffset::east_opt(2 * 3600).unwrap(),
            chrono::Duration::hours(1),
        );
        assert_eq!(
            index.segments()[0].coverage_start,
            Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_after() {
        let index = SegmentIndex::from_listing(
            cam(1),
            may_first(),
            &listing(&["2024-05-01_09-00-00", "2024-05-01_10-00-00"]),
            utc(),
            chrono::Duration::hours(1),
        );
        let first = index.segments()[0].source_url.clone();
        let second = index.segments()[1].source_url.clone();
        assert_eq!(index.next_after(&first).unwrap().source_url, second);
        assert!(index.next_after(&second).is_none());
        assert!(index.next_after("http://elsewhere").is_none());
    }

    #[test]
    fn test_download_url() {
        let index = SegmentIndex::from_listing(
            cam(1),
            may_first(),
            &listing(&["2024-05-01_09-00-00"]),
            utc(),
            chrono::Duration::hours(1),
        );
        assert_eq!(
            index.segments()[0].download_url(),
            "http://nvr/cam1/2024-05-01_09-00-00/recording.mp4"
        );
    }

    #[tokio::test]
    async fn test_locate_memoizes_per_key() {
        let directory = Arc::new(CountingDirectory::new(vec!["2024-05-01_09-00-00"]));
        let locator = SegmentLocator::new(directory.clone(), utc(), chrono::Duration::hours(1));

        let (a, b) = tokio::join!(
            locator.locate(cam(1), may_first()),
            locator.locate(cam(1), may_first())
        );
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);

        locator.locate(cam(2), may_first()).await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
        assert!(locator.cached(cam(1), may_first()).is_some());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let directory = Arc::new(CountingDirectory::new(vec!["2024-05-01_09-00-00"]));
        let locator = SegmentLocator::new(directory.clone(), utc(), chrono::Duration::hours(1));

        locator.locate(cam(1), may_first()).await;
        locator.invalidate_all();
        assert!(locator.cached(cam(1), may_first()).is_none());

        locator.locate(cam(1), may_first()).await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_directory_yields_empty_and_retries() {
        let mut directory = CountingDirectory::new(vec![]);
        directory.fail = true;
        let directory = Arc::new(directory);
        let locator = SegmentLocator::new(directory.clone(), utc(), chrono::Duration::hours(1));

        let index = locator.locate(cam(1), may_first()).await;
        assert!(index.is_empty());
        assert!(locator.cached(cam(1), may_first()).is_none());

        locator.locate(cam(1), may_first()).await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }
}
