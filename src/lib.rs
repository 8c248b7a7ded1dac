//! Camsync - synchronized multi-camera HLS playback
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod directory;
pub mod engine;
pub mod locator;
pub mod sync;
pub mod timeline;

pub use camsync_common::{CameraId, Error, Fragment, Result, TimelinePosition, Timestamp};
