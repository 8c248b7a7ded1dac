//! Headless HLS engine.
//!
//! Fetches and parses media playlists and keeps a wall-clock playhead. There
//! is no decoder behind it: "playing" means the playhead advances and an
//! [`EngineEvent::Ended`] fires when it reaches the end of the manifest.

use camsync_common::{CameraId, Fragment};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{
    fragments_of, EngineEvent, EngineFactory, ManifestClient, MediaHandle, PlaybackEngine,
    ENGINE_EVENT_CAPACITY,
};

#[derive(Default)]
struct EngineState {
    url: Option<String>,
    media: Option<MediaHandle>,
    fragments: Vec<Fragment>,
    duration: Option<f64>,
    /// Playhead at `anchor`, or the frozen playhead when paused.
    base_position: f64,
    anchor: Option<Instant>,
    /// Bumped on every source change; loads carrying an older value are stale.
    load_token: u64,
    destroyed: bool,
    load_task: Option<JoinHandle<()>>,
    end_task: Option<JoinHandle<()>>,
}

impl EngineState {
    fn position(&self) -> f64 {
        let elapsed = self
            .anchor
            .map(|a| a.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let pos = self.base_position + elapsed;
        match self.duration {
            Some(d) => pos.min(d),
            None => pos,
        }
    }

    fn abort_tasks(&mut self) {
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        if let Some(task) = self.end_task.take() {
            task.abort();
        }
    }
}

/// Headless [`PlaybackEngine`] over [`ManifestClient`].
pub struct HlsEngine {
    camera: CameraId,
    client: ManifestClient,
    events: broadcast::Sender<EngineEvent>,
    state: Arc<Mutex<EngineState>>,
}

impl HlsEngine {
    pub fn new(camera: CameraId, client: ManifestClient) -> Self {
        let (events, _) = broadcast::channel(ENGINE_EVENT_CAPACITY);
        Self {
            camera,
            client,
            events,
            state: Arc::new(Mutex::new(EngineState::default())),
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    /// Media binding set by `attach_media`.
    pub fn media(&self) -> Option<MediaHandle> {
        self.state.lock().media
    }

    fn emit(events: &broadcast::Sender<EngineEvent>, event: EngineEvent) {
        // No receivers is fine; the engine runs unobserved in some tools.
        let _ = events.send(event);
    }

    /// (Re)arm the end-of-media timer for the current playhead.
    fn schedule_end(
        state: &Arc<Mutex<EngineState>>,
        events: &broadcast::Sender<EngineEvent>,
        guard: &mut EngineState,
    ) {
        if let Some(task) = guard.end_task.take() {
            task.abort();
        }
        let (Some(duration), Some(url), true) =
            (guard.duration, guard.url.clone(), guard.anchor.is_some())
        else {
            return;
        };

        let remaining = (duration - guard.position()).max(0.0);
        let token = guard.load_token;
        let state = Arc::clone(state);
        let events = events.clone();

        guard.end_task = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
            {
                let mut s = state.lock();
                if s.load_token != token || s.anchor.is_none() {
                    return;
                }
                s.base_position = duration;
                s.anchor = None;
                s.end_task = None;
            }
            Self::emit(&events, EngineEvent::Ended { url });
        }));
    }
}

impl PlaybackEngine for HlsEngine {
    fn load_source(&self, url: &str) {
        let token = {
            let mut s = self.state.lock();
            if s.destroyed {
                tracing::warn!(camera = %self.camera, "load_source on destroyed engine");
                return;
            }
            s.load_token += 1;
            s.url = Some(url.to_string());
            if let Some(task) = s.load_task.take() {
                task.abort();
            }
            if let Some(task) = s.end_task.take() {
                task.abort();
            }
            s.load_token
        };

        Self::emit(
            &self.events,
            EngineEvent::ManifestLoading {
                url: url.to_string(),
            },
        );

        let client = self.client.clone();
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let camera = self.camera;
        let url = url.to_string();

        let task = tokio::spawn(async move {
            let text = match client.fetch_text(&url).await {
                Ok(text) => text,
                Err(e) => {
                    if state.lock().load_token == token {
                        Self::emit(
                            &events,
                            EngineEvent::ManifestFailed {
                                url,
                                reason: e.to_string(),
                            },
                        );
                    }
                    return;
                }
            };

            Self::emit(&events, EngineEvent::LevelLoading { url: url.clone() });

            let playlist = match camsync_media::MediaPlaylist::parse(&text) {
                Ok(p) => p,
                Err(e) => {
                    if state.lock().load_token == token {
                        Self::emit(
                            &events,
                            EngineEvent::ManifestFailed {
                                url,
                                reason: e.to_string(),
                            },
                        );
                    }
                    return;
                }
            };

            {
                let mut s = state.lock();
                if s.load_token != token {
                    tracing::trace!(camera = %camera, url = %url, "Discarding superseded manifest");
                    return;
                }
                s.fragments = fragments_of(&playlist);
                s.duration = Some(playlist.total_duration());
                s.base_position = 0.0;
                if s.anchor.is_some() {
                    s.anchor = Some(Instant::now());
                }
                s.load_task = None;
                tracing::debug!(
                    camera = %camera,
                    url = %url,
                    fragments = s.fragments.len(),
                    duration = playlist.total_duration(),
                    "Manifest parsed"
                );
            }

            Self::emit(&events, EngineEvent::ManifestParsed { url });
        });

        self.state.lock().load_task = Some(task);
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
        let mut s = self.state.lock();
        s.base_position = secs.max(0.0);
        if s.anchor.is_some() {
            s.anchor = Some(Instant::now());
        }
        Self::schedule_end(&self.state, &self.events, &mut s);
    }

    fn position_secs(&self) -> f64 {
        self.state.lock().position()
    }

    fn play(&self) {
        let mut s = self.state.lock();
        if s.destroyed || s.anchor.is_some() {
            return;
        }
        s.anchor = Some(Instant::now());
        Self::schedule_end(&self.state, &self.events, &mut s);
    }

    fn pause(&self) {
        let mut s = self.state.lock();
        s.base_position = s.position();
        s.anchor = None;
        if let Some(task) = s.end_task.take() {
            task.abort();
        }
    }

    fn is_playing(&self) -> bool {
        self.state.lock().anchor.is_some()
    }

    fn url(&self) -> Option<String> {
        self.state.lock().url.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn destroy(&self) {
        let mut s = self.state.lock();
        s.abort_tasks();
        s.load_token += 1;
        s.destroyed = true;
        s.url = None;
        s.media = None;
        s.fragments.clear();
        s.duration = None;
        s.anchor = None;
        s.base_position = 0.0;
    }
}

impl Drop for HlsEngine {
    fn drop(&mut self) {
        self.state.lock().abort_tasks();
    }
}

/// Creates [`HlsEngine`]s sharing one manifest client.
pub struct HlsEngineFactory {
    client: ManifestClient,
}

impl HlsEngineFactory {
    pub fn new(client: ManifestClient) -> Self {
        Self { client }
    }
}

impl EngineFactory for HlsEngineFactory {
    fn create(&self, camera: CameraId) -> Arc<dyn PlaybackEngine> {
        Arc::new(HlsEngine::new(camera, self.client.clone()))
    }
}
