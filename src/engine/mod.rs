//! Playback engine abstraction.
//!
//! The coordinator drives one [`PlaybackEngine`] per camera and listens to its
//! [`EngineEvent`]s through an [`EngineSubscription`]. [`HlsEngine`] is the
//! headless implementation used by the CLI; tests script their own.

mod hls;
mod manifest;

pub use hls::{HlsEngine, HlsEngineFactory};
pub use manifest::{fragments_of, ManifestClient};

use camsync_common::{CameraId, Fragment};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Capacity of each engine's event channel.
pub const ENGINE_EVENT_CAPACITY: usize = 64;

/// Lifecycle notification from a playback engine.
///
/// Every event carries the source URL it concerns, so listeners can drop
/// events for sources they have since replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A new source was requested.
    ManifestLoading { url: String },
    /// The manifest for `url` parsed; fragments are available.
    ManifestParsed { url: String },
    /// The media level for `url` is being read.
    LevelLoading { url: String },
    /// The manifest for `url` could not be fetched or parsed.
    ManifestFailed { url: String, reason: String },
    /// Playback reached the end of `url`.
    Ended { url: String },
}

impl EngineEvent {
    pub fn url(&self) -> &str {
        match self {
            Self::ManifestLoading { url }
            | Self::ManifestParsed { url }
            | Self::LevelLoading { url }
            | Self::ManifestFailed { url, .. }
            | Self::Ended { url } => url,
        }
    }
}

/// Render target an engine is bound to.
///
/// The binding survives source swaps; only destroying the engine releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(CameraId);

impl MediaHandle {
    pub fn for_camera(camera: CameraId) -> Self {
        Self(camera)
    }

    pub fn camera(&self) -> CameraId {
        self.0
    }
}

/// Per-camera media player.
///
/// Operations are non-blocking. Loading happens in the background and is
/// reported through [`subscribe`](PlaybackEngine::subscribe).
pub trait PlaybackEngine: Send + Sync {
    /// Replace the current source, keeping the media binding.
    fn load_source(&self, url: &str);

    fn attach_media(&self, media: MediaHandle);

    /// Fragments of the most recently parsed manifest.
    ///
    /// Until a new source parses, this still returns the previous source's
    /// fragments.
    fn current_level_fragments(&self) -> Vec<Fragment>;

    /// Total declared duration of the parsed manifest.
    fn level_duration_secs(&self) -> Option<f64>;

    fn set_play_position(&self, secs: f64);

    fn position_secs(&self) -> f64;

    fn play(&self);

    fn pause(&self);

    fn is_playing(&self) -> bool;

    /// Source most recently passed to `load_source`.
    fn url(&self) -> Option<String>;

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;

    /// Release the source and media binding. The engine is unusable afterwards.
    fn destroy(&self);
}

/// Creates engines for camera sessions.
pub trait EngineFactory: Send + Sync {
    fn create(&self, camera: CameraId) -> Arc<dyn PlaybackEngine>;
}

/// Scoped forwarding of one engine's events.
///
/// Events are mapped through `wrap` and sent to the given channel until the
/// guard is dropped, at which point the forwarding task is aborted.
pub struct EngineSubscription {
    task: JoinHandle<()>,
}

impl EngineSubscription {
    pub fn forward<T, F>(
        engine: &dyn PlaybackEngine,
        tx: mpsc::UnboundedSender<T>,
        wrap: F,
    ) -> Self
    where
        T: Send + 'static,
        F: Fn(EngineEvent) -> T + Send + 'static,
    {
        let mut rx = engine.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if tx.send(wrap(event)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Engine event listener lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { task }
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for EngineSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
