//! Per-camera stream sessions.

use camsync_common::{CameraId, Timestamp};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::{EngineSubscription, PlaybackEngine};
use crate::locator::Segment;

/// Lifecycle of one camera's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No engine bound for the active date.
    Uninitialized,
    /// Settled: either showing a segment or showing nothing.
    Idle,
    /// Waiting for the loaded segment's manifest before seeking to `target`.
    Seeking { target: Timestamp },
    /// Toggled off by the user.
    Disabled,
}

/// What the camera tile shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    Pending,
    Showing,
    NoRecording,
    Unavailable,
}

/// Binding between a camera and its playback engine.
pub struct StreamSession {
    pub(crate) camera: CameraId,
    pub(crate) enabled: bool,
    pub(crate) state: SessionState,
    pub(crate) status: TileStatus,
    pub(crate) loaded: Option<Segment>,
    /// Whether `loaded`'s manifest has parsed on the engine.
    pub(crate) manifest_ready: bool,
    pub(crate) engine: Option<Arc<dyn PlaybackEngine>>,
    subscription: Option<EngineSubscription>,
    pub(crate) last_known_url: Option<String>,
    /// Generation of the newest resolve issued for this camera.
    pub(crate) latest_generation: u64,
    /// Tag of the current engine binding; events from older bindings are dropped.
    pub(crate) epoch: u64,
}

impl StreamSession {
    pub fn new(camera: CameraId, enabled: bool) -> Self {
        Self {
            camera,
            enabled,
            state: if enabled {
                SessionState::Uninitialized
            } else {
                SessionState::Disabled
            },
            status: TileStatus::Pending,
            loaded: None,
            manifest_ready: false,
            engine: None,
            subscription: None,
            last_known_url: None,
            latest_generation: 0,
            epoch: 0,
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> TileStatus {
        self.status
    }

    pub fn loaded_segment(&self) -> Option<&Segment> {
        self.loaded.as_ref()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub(crate) fn bind(
        &mut self,
        engine: Arc<dyn PlaybackEngine>,
        subscription: EngineSubscription,
        epoch: u64,
    ) {
        self.engine = Some(engine);
        self.subscription = Some(subscription);
        self.epoch = epoch;
    }

    /// Whether `url` is the source this session currently has loaded.
    pub(crate) fn is_loaded(&self, url: &str) -> bool {
        self.loaded.as_ref().is_some_and(|s| s.source_url == url)
    }

    /// Point the engine at a new segment. The old fragments stay on the
    /// engine until the new manifest parses.
    pub(crate) fn swap_source(&mut self, segment: Segment, target: Timestamp) {
        if let Some(engine) = &self.engine {
            engine.load_source(&segment.source_url);
        }
        self.last_known_url = Some(segment.source_url.clone());
        self.loaded = Some(segment);
        self.manifest_ready = false;
        self.state = SessionState::Seeking { target };
        self.status = TileStatus::Pending;
    }

    /// Nothing recorded at the target: stay idle without a segment.
    pub(crate) fn show_no_recording(&mut self) {
        if let Some(engine) = &self.engine {
            engine.pause();
        }
        self.loaded = None;
        self.manifest_ready = false;
        self.state = SessionState::Idle;
        self.status = TileStatus::NoRecording;
    }

    pub(crate) fn show_unavailable(&mut self) {
        if let Some(engine) = &self.engine {
            engine.pause();
        }
        self.loaded = None;
        self.manifest_ready = false;
        self.state = SessionState::Idle;
        self.status = TileStatus::Unavailable;
    }

    /// Release the engine and its subscription and return to `Uninitialized`.
    pub(crate) fn teardown(&mut self) {
        // Unsubscribe before destroying so no teardown events are forwarded.
        self.subscription = None;
        if let Some(engine) = self.engine.take() {
            engine.destroy();
        }
        self.loaded = None;
        self.manifest_ready = false;
        self.state = SessionState::Uninitialized;
        self.status = TileStatus::Pending;
    }

    pub(crate) fn disable(&mut self) {
        self.teardown();
        self.enabled = false;
        self.state = SessionState::Disabled;
    }

    pub(crate) fn enable(&mut self) {
        if !self.enabled {
            self.enabled = true;
            self.state = SessionState::Uninitialized;
            self.status = TileStatus::Pending;
        }
    }

    pub fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot {
            camera: self.camera,
            enabled: self.enabled,
            state: self.state,
            status: self.status,
            segment: self.loaded.clone(),
            url: self.last_known_url.clone(),
            position_secs: self.engine.as_ref().map(|e| e.position_secs()),
            playing: self.engine.as_ref().is_some_and(|e| e.is_playing()),
        }
    }
}

/// Serialisable view of one camera tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraSnapshot {
    pub camera: CameraId,
    pub enabled: bool,
    pub state: SessionState,
    pub status: TileStatus,
    pub segment: Option<Segment>,
    pub url: Option<String>,
    pub position_secs: Option<f64>,
    pub playing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn segment() -> Segment {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Segment {
            camera: CameraId::new(1).unwrap(),
            identifier: "2024-05-01_09-00-00".into(),
            coverage_start: start,
            coverage_end: start + Duration::hours(1),
            source_url: "http://nvr/cam1/2024-05-01_09-00-00/playlist.m3u8".into(),
            duration_secs: None,
        }
    }

    #[test]
    fn test_new_session_states() {
        let cam = CameraId::new(1).unwrap();
        assert_eq!(StreamSession::new(cam, true).state(), SessionState::Uninitialized);
        assert_eq!(StreamSession::new(cam, false).state(), SessionState::Disabled);
    }

    #[test]
    fn test_swap_then_no_recording() {
        let mut session = StreamSession::new(CameraId::new(1).unwrap(), true);
        let seg = segment();
        let target = seg.coverage_start;

        session.swap_source(seg.clone(), target);
        assert_eq!(session.state(), SessionState::Seeking { target });
        assert!(session.is_loaded(&seg.source_url));
        assert!(!session.manifest_ready);

        session.show_no_recording();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.status(), TileStatus::NoRecording);
        assert!(session.loaded_segment().is_none());
        assert_eq!(session.last_known_url.as_deref(), Some(seg.source_url.as_str()));
    }

    #[test]
    fn test_disable_and_enable() {
        let mut session = StreamSession::new(CameraId::new(2).unwrap(), true);
        session.swap_source(segment(), segment().coverage_start);

        session.disable();
        assert!(!session.is_enabled());
        assert_eq!(session.state(), SessionState::Disabled);
        assert!(session.loaded_segment().is_none());

        session.enable();
        assert!(session.is_enabled());
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_snapshot_serializes() {
        let session = StreamSession::new(CameraId::new(3).unwrap(), true);
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["camera"], 3);
        assert_eq!(json["state"], "uninitialized");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["playing"], false);
    }
}
