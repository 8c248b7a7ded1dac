//! Error types shared across camsync.
//!
//! The first four variants form the per-camera failure taxonomy. None of them
//! is fatal to a synchronized session: the coordinator folds each into the
//! affected camera's tile status and carries on with the other cameras.

use crate::ids::CameraId;

/// Common error type for camsync.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No located segment covers the requested instant.
    #[error("No recording for camera {camera} at {instant}")]
    NoRecordingForInstant { camera: CameraId, instant: String },

    /// The playback engine could not load or parse a segment manifest.
    #[error("Manifest unavailable for {url}: {reason}")]
    ManifestUnavailable { url: String, reason: String },

    /// The directory listing service could not be reached or answered badly.
    #[error("Directory unreachable for camera {camera}: {reason}")]
    DirectoryUnreachable { camera: CameraId, reason: String },

    /// A listing entry did not carry a `YYYY-MM-DD_HH-MM-SS` timestamp.
    #[error("Malformed segment identifier: {0}")]
    MalformedSegmentIdentifier(String),

    /// An operation needs data that has not arrived yet (e.g. fragments
    /// before the manifest is parsed).
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new ManifestUnavailable error.
    pub fn manifest_unavailable<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::ManifestUnavailable {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a new DirectoryUnreachable error.
    pub fn directory_unreachable<R: Into<String>>(camera: CameraId, reason: R) -> Self {
        Self::DirectoryUnreachable {
            camera,
            reason: reason.into(),
        }
    }

    /// Create a new NotReady error.
    pub fn not_ready<S: Into<String>>(msg: S) -> Self {
        Self::NotReady(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// True for failures that only mean "nothing to show for this camera".
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            Self::NoRecordingForInstant { .. } | Self::DirectoryUnreachable { .. }
        )
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
