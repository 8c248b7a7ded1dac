//! Error types for camsync-media.

use thiserror::Error;

/// Result type for camsync-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for camsync-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The text is not an M3U8 playlist.
    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),

    /// A tag carried a value that could not be parsed.
    #[error("Invalid tag on line {line}: {tag}")]
    InvalidTag { line: usize, tag: String },

    /// Unsupported playlist feature.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create an invalid playlist error.
    pub fn invalid_playlist(msg: impl Into<String>) -> Self {
        Self::InvalidPlaylist(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}
