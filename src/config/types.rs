use camsync_common::CameraId;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub cameras: CamerasConfig,

    #[serde(default)]
    pub timeline: TimelineConfig,

    #[serde(default)]
    pub scrub: ScrubConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
    /// Auto-index pages served over HTTP (nginx, `python -m http.server`, ...)
    #[default]
    Http,
    /// A recordings tree on the local filesystem
    Fs,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub kind: DirectoryKind,

    /// Base URL of the recordings listing (HTTP kind)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Recordings root directory (fs kind)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Per-camera directory name; `{id}` is replaced by the camera number
    #[serde(default = "default_camera_dir")]
    pub camera_dir: String,

    /// Playlist file inside each segment directory
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/recordings".to_string()
}

fn default_camera_dir() -> String {
    "cam{id}".to_string()
}

fn default_playlist_name() -> String {
    "playlist.m3u8".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl DirectoryConfig {
    /// Directory name for one camera.
    pub fn camera_dir_for(&self, camera: CameraId) -> String {
        self.camera_dir.replace("{id}", &camera.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            kind: DirectoryKind::default(),
            base_url: default_base_url(),
            root: None,
            camera_dir: default_camera_dir(),
            playlist_name: default_playlist_name(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CamerasConfig {
    #[serde(default = "default_camera_count")]
    pub count: u8,

    /// Cameras that start toggled off
    #[serde(default)]
    pub disabled: Vec<u8>,
}

fn default_camera_count() -> u8 {
    4
}

impl CamerasConfig {
    pub fn ids(&self) -> impl Iterator<Item = CameraId> {
        CameraId::range(self.count)
    }

    pub fn starts_enabled(&self, camera: CameraId) -> bool {
        !self.disabled.contains(&camera.get())
    }
}

impl Default for CamerasConfig {
    fn default() -> Self {
        Self {
            count: default_camera_count(),
            disabled: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimelineConfig {
    /// Site UTC offset used for segment identifiers and the selected date,
    /// e.g. `+02:00`
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Coverage length of one recording bucket
    #[serde(default = "default_bucket_secs")]
    pub bucket_secs: u64,
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_bucket_secs() -> u64 {
    3600
}

/// Longest recording bucket accepted: one day
pub const MAX_BUCKET_SECS: u64 = 86_400;

impl TimelineConfig {
    /// Parsed site offset. Validation guarantees this succeeds for loaded
    /// configs; unparseable values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        parse_utc_offset(&self.utc_offset).unwrap_or_else(utc)
    }

    /// Bucket length, clamped to `1..=MAX_BUCKET_SECS` seconds.
    pub fn bucket(&self) -> chrono::Duration {
        let secs = self.bucket_secs.clamp(1, MAX_BUCKET_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            bucket_secs: default_bucket_secs(),
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parse `Z`, `+HH:MM`, `-HH:MM` or `+HHMM`.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Some(utc());
    }
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrubConfig {
    /// Quiescence window before a scrub position is forwarded
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    100
}

impl ScrubConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Timeout for manifest fetches
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}
