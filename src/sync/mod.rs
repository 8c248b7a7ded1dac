//! Multi-camera synchronization.
//!
//! - [`SyncCoordinator`] owns one [`StreamSession`] per camera and keeps them
//!   all on the shared timeline position.
//! - [`ScrubDebouncer`] rate-limits scrubber input in front of it.

mod coordinator;
mod debounce;
mod session;

pub use coordinator::{
    CoordinatorHandle, CoordinatorOptions, CoordinatorSnapshot, SyncCoordinator, SyncEvent,
};
pub use debounce::{ScrubDebouncer, ScrubSink};
pub use session::{CameraSnapshot, SessionState, StreamSession, TileStatus};
