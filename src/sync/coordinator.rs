//! Sync coordinator actor.
//!
//! One task owns every [`StreamSession`] and the shared [`TimelinePosition`].
//! Per-camera resolves run as independent tasks and report back over a
//! channel, tagged with the generation they were issued for; completions
//! whose generation is no longer the camera's latest are dropped.

use async_trait::async_trait;
use camsync_common::{CameraId, Error, Result, Timestamp, TimelinePosition};
use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::debounce::ScrubSink;
use super::session::{CameraSnapshot, SessionState, StreamSession, TileStatus};
use crate::config::Config;
use crate::engine::{EngineEvent, EngineFactory, EngineSubscription, MediaHandle};
use crate::locator::{Segment, SegmentLocator};
use crate::timeline::{resolve, seek};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Observable outcome of a per-camera operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A new segment source was handed to the camera's engine.
    Loading { camera: CameraId, url: String },
    /// The camera's engine was positioned.
    Seeked {
        camera: CameraId,
        url: String,
        offset_secs: f64,
    },
    /// Nothing recorded for the camera at the instant.
    NoRecording {
        camera: CameraId,
        instant: Timestamp,
    },
    /// The camera's segment could not be played.
    Unavailable { camera: CameraId, reason: String },
}

impl SyncEvent {
    pub fn camera(&self) -> CameraId {
        match self {
            Self::Loading { camera, .. }
            | Self::Seeked { camera, .. }
            | Self::NoRecording { camera, .. }
            | Self::Unavailable { camera, .. } => *camera,
        }
    }
}

/// Serialisable view of the whole coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorSnapshot {
    pub position: TimelinePosition,
    pub playing: bool,
    pub cameras: Vec<CameraSnapshot>,
}

impl CoordinatorSnapshot {
    pub fn camera(&self, camera: CameraId) -> Option<&CameraSnapshot> {
        self.cameras.iter().find(|c| c.camera == camera)
    }
}

/// Startup parameters for [`SyncCoordinator::spawn`].
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub cameras: Vec<CameraId>,
    pub disabled: Vec<CameraId>,
    pub utc_offset: FixedOffset,
    pub position: TimelinePosition,
}

impl CoordinatorOptions {
    pub fn from_config(config: &Config, position: TimelinePosition) -> Self {
        let cameras: Vec<CameraId> = config.cameras.ids().collect();
        let disabled = cameras
            .iter()
            .copied()
            .filter(|&c| !config.cameras.starts_enabled(c))
            .collect();
        Self {
            cameras,
            disabled,
            utc_offset: config.timeline.offset(),
            position,
        }
    }
}

enum Command {
    Seek(TimelinePosition),
    ScrubTo(u32),
    SetDate(NaiveDate),
    SetEnabled(CameraId, bool),
    Play,
    Pause,
    Snapshot(oneshot::Sender<CoordinatorSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

struct Resolved {
    camera: CameraId,
    generation: u64,
    target: Timestamp,
    segment: Result<Segment>,
}

struct EngineMessage {
    camera: CameraId,
    epoch: u64,
    event: EngineEvent,
}

/// Cloneable front end of a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SyncEvent>,
}

impl CoordinatorHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::internal("sync coordinator has stopped"))
    }

    /// Move the shared timeline to `position`, changing date if needed.
    pub async fn seek(&self, position: TimelinePosition) -> Result<()> {
        self.send(Command::Seek(position)).await
    }

    /// Move to `offset_ms` on the current date.
    pub async fn scrub(&self, offset_ms: u32) -> Result<()> {
        self.send(Command::ScrubTo(offset_ms)).await
    }

    /// Select a new date, keeping the offset within the day.
    pub async fn set_date(&self, date: NaiveDate) -> Result<()> {
        self.send(Command::SetDate(date)).await
    }

    pub async fn set_enabled(&self, camera: CameraId, enabled: bool) -> Result<()> {
        self.send(Command::SetEnabled(camera, enabled)).await
    }

    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    pub async fn snapshot(&self) -> Result<CoordinatorSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx)).await?;
        rx.await
            .map_err(|_| Error::internal("sync coordinator dropped snapshot request"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Tear down every session and stop the actor.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx)).await?;
        rx.await
            .map_err(|_| Error::internal("sync coordinator stopped before acknowledging"))
    }
}

#[async_trait]
impl ScrubSink for CoordinatorHandle {
    async fn scrub_to(&self, offset_ms: u32) {
        if let Err(e) = self.scrub(offset_ms).await {
            tracing::warn!("Dropping scrub to {}ms: {}", offset_ms, e);
        }
    }
}

/// Owner of all stream sessions.
pub struct SyncCoordinator {
    locator: Arc<SegmentLocator>,
    factory: Arc<dyn EngineFactory>,
    utc_offset: FixedOffset,
    sessions: Vec<StreamSession>,
    position: TimelinePosition,
    playing: bool,
    generation: u64,
    next_epoch: u64,
    events: broadcast::Sender<SyncEvent>,
    commands: mpsc::Receiver<Command>,
    resolved_tx: mpsc::UnboundedSender<Resolved>,
    resolved_rx: mpsc::UnboundedReceiver<Resolved>,
    engine_tx: mpsc::UnboundedSender<EngineMessage>,
    engine_rx: mpsc::UnboundedReceiver<EngineMessage>,
}

impl SyncCoordinator {
    /// Start the actor and synchronize every enabled camera to the initial
    /// position.
    ///
    /// The returned receiver is subscribed before the first synchronization,
    /// so it observes every event.
    pub fn spawn(
        locator: Arc<SegmentLocator>,
        factory: Arc<dyn EngineFactory>,
        options: CoordinatorOptions,
    ) -> (CoordinatorHandle, broadcast::Receiver<SyncEvent>) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (events, first_rx) = broadcast::channel(EVENT_CAPACITY);
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();

        let count = options.cameras.iter().map(|c| c.get()).max().unwrap_or(0);
        let sessions = CameraId::range(count)
            .map(|camera| {
                let enabled =
                    options.cameras.contains(&camera) && !options.disabled.contains(&camera);
                StreamSession::new(camera, enabled)
            })
            .collect();

        let coordinator = Self {
            locator,
            factory,
            utc_offset: options.utc_offset,
            sessions,
            position: options.position,
            playing: false,
            generation: 0,
            next_epoch: 0,
            events: events.clone(),
            commands,
            resolved_tx,
            resolved_rx,
            engine_tx,
            engine_rx,
        };

        tokio::spawn(coordinator.run());
        let handle = CoordinatorHandle {
            commands: command_tx,
            events,
        };
        (handle, first_rx)
    }

    async fn run(mut self) {
        tracing::info!(
            cameras = self.sessions.len(),
            position = %self.position,
            "Sync coordinator started"
        );
        self.synchronize();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(ack) = self.handle_command(command) {
                            self.shutdown();
                            let _ = ack.send(());
                            return;
                        }
                    }
                    None => break,
                },
                Some(resolved) = self.resolved_rx.recv() => self.on_resolved(resolved),
                Some(message) = self.engine_rx.recv() => self.on_engine_event(message),
            }
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<oneshot::Sender<()>> {
        match command {
            Command::Seek(position) => {
                if position.date() != self.position.date() {
                    self.position = position;
                    self.change_date();
                } else {
                    self.position = position;
                    self.synchronize();
                }
            }
            Command::ScrubTo(offset_ms) => match self.position.with_offset(offset_ms) {
                Ok(position) => {
                    self.position = position;
                    self.synchronize();
                }
                Err(e) => tracing::warn!("Ignoring scrub: {}", e),
            },
            Command::SetDate(date) => {
                if date != self.position.date() {
                    self.position = TimelinePosition::new(date, self.position.offset_ms())
                        .unwrap_or_else(|_| TimelinePosition::start_of(date));
                    self.change_date();
                }
            }
            Command::SetEnabled(camera, enabled) => self.set_enabled(camera, enabled),
            Command::Play => self.set_playing(true),
            Command::Pause => self.set_playing(false),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown(ack) => return ControlFlow::Break(ack),
        }
        ControlFlow::Continue(())
    }

    fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            position: self.position,
            playing: self.playing,
            cameras: self.sessions.iter().map(StreamSession::snapshot).collect(),
        }
    }

    /// Sessions form an arena indexed by `CameraId::index`.
    fn session_mut(&mut self, camera: CameraId) -> Option<&mut StreamSession> {
        self.sessions
            .get_mut(camera.index())
            .filter(|s| s.camera == camera)
    }

    fn emit(&self, event: SyncEvent) {
        // Nobody listening is normal.
        let _ = self.events.send(event);
    }

    /// Fan out a resolve for every enabled camera at the current position.
    fn synchronize(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let cameras: Vec<CameraId> = self
            .sessions
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.camera)
            .collect();

        tracing::debug!(position = %self.position, generation, "Synchronizing cameras");
        for camera in cameras {
            self.dispatch_resolve(camera, generation);
        }
    }

    fn dispatch_resolve(&mut self, camera: CameraId, generation: u64) {
        let Some(session) = self.session_mut(camera) else {
            return;
        };
        session.latest_generation = generation;

        let locator = Arc::clone(&self.locator);
        let tx = self.resolved_tx.clone();
        let date = self.position.date();
        let target = self.position.absolute(self.utc_offset);

        tokio::spawn(async move {
            let index = locator.locate(camera, date).await;
            let segment = resolve(index.segments(), target)
                .cloned()
                .ok_or_else(|| Error::NoRecordingForInstant {
                    camera,
                    instant: target.to_rfc3339(),
                });
            let _ = tx.send(Resolved {
                camera,
                generation,
                target,
                segment,
            });
        });
    }

    fn on_resolved(&mut self, resolved: Resolved) {
        let Resolved {
            camera,
            generation,
            target,
            segment,
        } = resolved;

        let playing = self.playing;
        let Some(session) = self.session_mut(camera) else {
            return;
        };
        if !session.enabled || generation != session.latest_generation {
            tracing::debug!(
                camera = %camera,
                generation,
                latest = session.latest_generation,
                "Discarding stale resolve"
            );
            return;
        }

        let segment = match segment {
            Ok(segment) => segment,
            Err(e) => {
                tracing::debug!(camera = %camera, "{}", e);
                session.show_no_recording();
                self.emit(SyncEvent::NoRecording {
                    camera,
                    instant: target,
                });
                return;
            }
        };

        self.ensure_engine(camera);
        let Some(session) = self.session_mut(camera) else {
            return;
        };

        if session.is_loaded(&segment.source_url) {
            if session.manifest_ready {
                let event = apply_seek(session, target, playing);
                self.emit(event);
            } else {
                // Same source still loading; seek once it parses.
                session.state = SessionState::Seeking { target };
            }
            return;
        }

        let url = segment.source_url.clone();
        tracing::debug!(camera = %camera, url = %url, "Swapping segment source");
        session.swap_source(segment, target);
        self.emit(SyncEvent::Loading { camera, url });
    }

    fn on_engine_event(&mut self, message: EngineMessage) {
        let EngineMessage {
            camera,
            epoch,
            event,
        } = message;

        let playing = self.playing;
        let date = self.position.date();
        let Some(session) = self.session_mut(camera) else {
            return;
        };
        if session.epoch != epoch || session.engine.is_none() {
            return;
        }
        if !session.is_loaded(event.url()) {
            tracing::trace!(camera = %camera, url = %event.url(), "Ignoring event for superseded source");
            return;
        }

        match event {
            EngineEvent::ManifestLoading { url } | EngineEvent::LevelLoading { url } => {
                tracing::trace!(camera = %camera, url = %url, "Loading");
            }
            EngineEvent::ManifestParsed { url } => {
                session.manifest_ready = true;
                if let (Some(segment), Some(engine)) = (session.loaded.as_mut(), &session.engine) {
                    segment.duration_secs = engine.level_duration_secs();
                }
                tracing::debug!(camera = %camera, url = %url, "Manifest ready");
                if let SessionState::Seeking { target } = session.state {
                    let event = apply_seek(session, target, playing);
                    self.emit(event);
                }
            }
            EngineEvent::ManifestFailed { url, reason } => {
                let err = Error::manifest_unavailable(url, reason);
                tracing::warn!(camera = %camera, "{}", err);
                session.show_unavailable();
                self.emit(SyncEvent::Unavailable {
                    camera,
                    reason: err.to_string(),
                });
            }
            EngineEvent::Ended { url } => {
                if !playing {
                    return;
                }
                let next = self
                    .locator
                    .cached(camera, date)
                    .and_then(|index| index.next_after(&url).cloned());
                let Some(session) = self.session_mut(camera) else {
                    return;
                };
                match next {
                    Some(next) => {
                        tracing::info!(camera = %camera, next = %next.identifier, "Continuing into next segment");
                        let start = next.coverage_start;
                        let next_url = next.source_url.clone();
                        session.swap_source(next, start);
                        self.emit(SyncEvent::Loading {
                            camera,
                            url: next_url,
                        });
                    }
                    None => {
                        tracing::debug!(camera = %camera, "End of recordings for the day");
                    }
                }
            }
        }
    }

    /// Bind an engine to the camera's session if it has none.
    fn ensure_engine(&mut self, camera: CameraId) {
        let needs_engine = self
            .session_mut(camera)
            .is_some_and(|s| s.enabled && s.engine.is_none());
        if !needs_engine {
            return;
        }

        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let engine = self.factory.create(camera);
        engine.attach_media(MediaHandle::for_camera(camera));
        let subscription =
            EngineSubscription::forward(engine.as_ref(), self.engine_tx.clone(), move |event| {
                EngineMessage {
                    camera,
                    epoch,
                    event,
                }
            });

        if let Some(session) = self.session_mut(camera) {
            tracing::debug!(camera = %camera, epoch, "Bound playback engine");
            session.bind(engine, subscription, epoch);
            session.state = SessionState::Idle;
        }
    }

    fn set_enabled(&mut self, camera: CameraId, enabled: bool) {
        let Some(session) = self.session_mut(camera) else {
            tracing::warn!(camera = %camera, "Toggle for unknown camera");
            return;
        };

        if enabled {
            if session.enabled {
                return;
            }
            session.enable();
            tracing::info!(camera = %camera, "Camera enabled");
            self.generation += 1;
            let generation = self.generation;
            self.dispatch_resolve(camera, generation);
        } else if session.enabled {
            session.disable();
            tracing::info!(camera = %camera, "Camera disabled");
        }
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        for session in self.sessions.iter().filter(|s| s.enabled) {
            let Some(engine) = &session.engine else {
                continue;
            };
            if !playing {
                engine.pause();
            } else if session.state == SessionState::Idle && session.status == TileStatus::Showing
            {
                engine.play();
            }
        }
    }

    /// Full teardown and re-initialization for a new date.
    fn change_date(&mut self) {
        tracing::info!(date = %self.position.date(), "Date changed; resetting sessions");
        for session in self.sessions.iter_mut().filter(|s| s.enabled) {
            session.teardown();
        }
        self.locator.invalidate_all();
        self.synchronize();
    }

    fn shutdown(&mut self) {
        for session in &mut self.sessions {
            session.teardown();
        }
        tracing::info!("Sync coordinator stopped");
    }
}

/// Seek the session's engine to `target` within its loaded segment.
fn apply_seek(session: &mut StreamSession, target: Timestamp, playing: bool) -> SyncEvent {
    let camera = session.camera;
    let url = session
        .loaded
        .as_ref()
        .map(|s| s.source_url.clone())
        .unwrap_or_default();
    let Some(engine) = session.engine.clone() else {
        session.show_unavailable();
        return SyncEvent::Unavailable {
            camera,
            reason: "no playback engine".to_string(),
        };
    };

    match seek(&engine.current_level_fragments(), target) {
        Ok(offset_secs) => {
            engine.set_play_position(offset_secs);
            if playing {
                engine.play();
            }
            session.state = SessionState::Idle;
            session.status = TileStatus::Showing;
            tracing::debug!(camera = %camera, url = %url, offset_secs, "Seeked");
            SyncEvent::Seeked {
                camera,
                url,
                offset_secs,
            }
        }
        Err(e) => {
            tracing::warn!(camera = %camera, url = %url, "Parsed manifest has no seekable fragments: {}", e);
            session.show_unavailable();
            SyncEvent::Unavailable {
                camera,
                reason: e.to_string(),
            }
        }
    }
}
