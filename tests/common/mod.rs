//! Shared test harness for integration tests.
//!
//! Provides [`MockDirectory`] (scripted listings, optional gates) and
//! [`MockEngineFactory`] whose engines either parse manifests on their own or
//! wait for the test to complete them.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};

use camsync::directory::{DirectoryListing, DirectoryService};
use camsync::engine::{EngineEvent, EngineFactory, MediaHandle, PlaybackEngine};
use camsync::locator::SegmentLocator;
use camsync::sync::{
    CoordinatorHandle, CoordinatorOptions, SyncCoordinator, SyncEvent,
};
use camsync::{CameraId, Error, Fragment, Result, TimelinePosition, Timestamp};

pub fn cam(n: u8) -> CameraId {
    CameraId::new(n).unwrap()
}

pub fn may_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

pub fn may_second() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
}

pub fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> Timestamp {
    Utc.from_utc_datetime(&date.and_hms_opt(h, m, s).unwrap())
}

pub fn position(date: NaiveDate, h: u32, m: u32, s: u32) -> TimelinePosition {
    TimelinePosition::new(date, (h * 3600 + m * 60 + s) * 1000).unwrap()
}

pub fn segment_url(camera: CameraId, date: NaiveDate, hour: u32) -> String {
    format!(
        "mock://cam{}/{}_{:02}-00-00/playlist.m3u8",
        camera,
        date.format("%Y-%m-%d"),
        hour
    )
}

/// Fragments at :00:00, :15:00, :29:50 and :45:00 of the hour.
pub fn quarter_fragments(date: NaiveDate, hour: u32) -> Vec<Fragment> {
    vec![
        Fragment::new(at(date, hour, 0, 0), 0.0),
        Fragment::new(at(date, hour, 15, 0), 900.0),
        Fragment::new(at(date, hour, 29, 50), 1790.0),
        Fragment::new(at(date, hour, 45, 0), 2700.0),
    ]
}

// ---------------------------------------------------------------------------
// MockDirectory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockDirectory {
    listings: Mutex<HashMap<CameraId, Vec<String>>>,
    unreachable: Mutex<HashSet<CameraId>>,
    gate: Option<Arc<Semaphore>>,
    date_gates: Mutex<HashMap<NaiveDate, Arc<Semaphore>>>,
    calls: AtomicUsize,
    returned: AtomicUsize,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listing calls block until [`open_gate`](Self::open_gate).
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Listing calls for `date` block until [`open_date`](Self::open_date).
    pub fn with_gated_date(self, date: NaiveDate) -> Self {
        self.date_gates
            .lock()
            .insert(date, Arc::new(Semaphore::new(0)));
        self
    }

    pub fn open_date(&self, date: NaiveDate) {
        if let Some(gate) = self.date_gates.lock().get(&date) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Record hour buckets for `camera` on `date`.
    pub fn with_hours(self, camera: CameraId, date: NaiveDate, hours: &[u32]) -> Self {
        {
            let mut listings = self.listings.lock();
            let entry = listings.entry(camera).or_default();
            for hour in hours {
                entry.push(format!("{}_{:02}-00-00", date.format("%Y-%m-%d"), hour));
            }
        }
        self
    }

    pub fn with_unreachable(self, camera: CameraId) -> Self {
        self.unreachable.lock().insert(camera);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Listing calls that got past their gates.
    pub fn returned(&self) -> usize {
        self.returned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryService for MockDirectory {
    async fn list(&self, camera: CameraId, date: NaiveDate) -> Result<DirectoryListing> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| Error::internal(e.to_string()))?;
        }
        let date_gate = self.date_gates.lock().get(&date).cloned();
        if let Some(gate) = date_gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| Error::internal(e.to_string()))?;
        }
        self.returned.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.lock().contains(&camera) {
            return Err(Error::directory_unreachable(camera, "mock outage"));
        }
        Ok(DirectoryListing {
            base: format!("mock://cam{}", camera),
            playlist_name: "playlist.m3u8".to_string(),
            identifiers: self
                .listings
                .lock()
                .get(&camera)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockEngine
// ---------------------------------------------------------------------------

/// Manifest contents by source URL; URLs missing here fail to load.
pub type Manifests = Arc<Mutex<HashMap<String, Vec<Fragment>>>>;

#[derive(Default)]
struct MockState {
    url: Option<String>,
    media: Option<MediaHandle>,
    fragments: Vec<Fragment>,
    duration: Option<f64>,
    position: f64,
    playing: bool,
    destroyed: bool,
    loads: Vec<String>,
}

pub struct MockEngine {
    camera: CameraId,
    auto_parse: bool,
    manifests: Manifests,
    events: broadcast::Sender<EngineEvent>,
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    fn new(camera: CameraId, auto_parse: bool, manifests: Manifests) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            camera,
            auto_parse,
            manifests,
            events,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn parse(
        state: &Mutex<MockState>,
        manifests: &Manifests,
        events: &broadcast::Sender<EngineEvent>,
        url: &str,
    ) {
        let fragments = manifests.lock().get(url).cloned();
        match fragments {
            Some(fragments) => {
                {
                    let mut s = state.lock();
                    if s.url.as_deref() == Some(url) {
                        s.duration = fragments.last().map(|f| f.start_secs + 10.0);
                        s.fragments = fragments;
                        s.position = 0.0;
                    }
                }
                let _ = events.send(EngineEvent::ManifestParsed {
                    url: url.to_string(),
                });
            }
            None => {
                let _ = events.send(EngineEvent::ManifestFailed {
                    url: url.to_string(),
                    reason: "404 Not Found".to_string(),
                });
            }
        }
    }

    /// Finish loading `url` as if its manifest had just arrived.
    pub fn complete(&self, url: &str) {
        Self::parse(&self.state, &self.manifests, &self.events, url);
    }

    /// Report the end of the current source.
    pub fn finish(&self) {
        let url = self.state.lock().url.clone();
        if let Some(url) = url {
            self.state.lock().playing = false;
            let _ = self.events.send(EngineEvent::Ended { url });
        }
    }

    pub fn loads(&self) -> Vec<String> {
        self.state.lock().loads.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub fn media(&self) -> Option<MediaHandle> {
        self.state.lock().media
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }
}

impl PlaybackEngine for MockEngine {
    fn load_source(&self, url: &str) {
        {
            let mut s = self.state.lock();
            s.url = Some(url.to_string());
            s.loads.push(url.to_string());
        }
        let _ = self.events.send(EngineEvent::ManifestLoading {
            url: url.to_string(),
        });

        if self.auto_parse {
            let state = Arc::clone(&self.state);
            let manifests = Arc::clone(&self.manifests);
            let events = self.events.clone();
            let url = url.to_string();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                let _ = events.send(EngineEvent::LevelLoading { url: url.clone() });
                Self::parse(&state, &manifests, &events, &url);
            });
        }
    }

    fn attach_media(&self, media: MediaHandle) {
        self.state.lock().media = Some(media);
    }

    fn current_level_fragments(&self) -> Vec<Fragment> {
        self.state.lock().fragments.clone()
    }

    fn level_duration_secs(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn set_play_position(&self, secs: f64) {
        self.state.lock().position = secs;
    }

    fn position_secs(&self) -> f64 {
        self.state.lock().position
    }

    fn play(&self) {
        self.state.lock().playing = true;
    }

    fn pause(&self) {
        self.state.lock().playing = false;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn url(&self) -> Option<String> {
        self.state.lock().url.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn destroy(&self) {
        let mut s = self.state.lock();
        s.destroyed = true;
        s.url = None;
        s.media = None;
        s.fragments.clear();
        s.playing = false;
    }
}

pub struct MockEngineFactory {
    auto_parse: bool,
    manifests: Manifests,
    created: Mutex<Vec<Arc<MockEngine>>>,
}

impl MockEngineFactory {
    pub fn new(auto_parse: bool) -> Self {
        Self {
            auto_parse,
            manifests: Arc::new(Mutex::new(HashMap::new())),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_manifest(self, url: String, fragments: Vec<Fragment>) -> Self {
        self.manifests.lock().insert(url, fragments);
        self
    }

    /// Most recently created engine for `camera`.
    pub fn engine(&self, camera: CameraId) -> Option<Arc<MockEngine>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|e| e.camera() == camera)
            .cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl EngineFactory for MockEngineFactory {
    fn create(&self, camera: CameraId) -> Arc<dyn PlaybackEngine> {
        let engine = Arc::new(MockEngine::new(
            camera,
            self.auto_parse,
            Arc::clone(&self.manifests),
        ));
        self.created.lock().push(Arc::clone(&engine));
        engine
    }
}

// ---------------------------------------------------------------------------
// Coordinator harness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub handle: CoordinatorHandle,
    pub events: broadcast::Receiver<SyncEvent>,
    pub directory: Arc<MockDirectory>,
    pub factory: Arc<MockEngineFactory>,
}

impl TestHarness {
    pub fn start(
        directory: MockDirectory,
        factory: MockEngineFactory,
        cameras: u8,
        start: TimelinePosition,
    ) -> Self {
        let directory = Arc::new(directory);
        let factory = Arc::new(factory);
        let locator = Arc::new(SegmentLocator::new(
            directory.clone(),
            FixedOffset::east_opt(0).unwrap(),
            chrono::Duration::hours(1),
        ));
        let options = CoordinatorOptions {
            cameras: CameraId::range(cameras).collect(),
            disabled: vec![],
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            position: start,
        };

        let (handle, events) = SyncCoordinator::spawn(locator, factory.clone(), options);
        Self {
            handle,
            events,
            directory,
            factory,
        }
    }

    /// Next event matching `pred`, skipping others.
    pub async fn wait_for<F>(&mut self, mut pred: F) -> SyncEvent
    where
        F: FnMut(&SyncEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = self.events.recv().await.expect("event channel open");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for sync event")
    }

    /// Next `Seeked` event for `camera`.
    pub async fn seeked(&mut self, camera: CameraId) -> (String, f64) {
        match self
            .wait_for(|e| matches!(e, SyncEvent::Seeked { camera: c, .. } if *c == camera))
            .await
        {
            SyncEvent::Seeked {
                url, offset_secs, ..
            } => (url, offset_secs),
            other => unreachable!("{:?}", other),
        }
    }

    /// Round-trip through the actor so every earlier command is applied.
    pub async fn settle(&self) {
        self.handle.snapshot().await.unwrap();
    }
}
