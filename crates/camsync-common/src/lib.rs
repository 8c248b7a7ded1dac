//! Camsync-Common: Shared ids, timeline types, and errors.
//!
//! This crate provides the vocabulary shared by every camsync component:
//!
//! - **Typed IDs**: [`CameraId`], a validated 1-based camera number
//! - **Timeline Types**: [`TimelinePosition`] (date + offset within the day)
//!   and [`Fragment`] (a timestamped sub-chunk of a loaded segment)
//! - **Error Handling**: the per-camera failure taxonomy and a result alias
//!
//! # Examples
//!
//! ```
//! use camsync_common::{CameraId, TimelinePosition, Error, Result};
//! use chrono::NaiveDate;
//!
//! let camera = CameraId::new(1).unwrap();
//! assert_eq!(camera.get(), 1);
//!
//! let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let position = TimelinePosition::new(date, 9 * 3_600_000).unwrap();
//! assert_eq!(position.offset_ms(), 32_400_000);
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_ready("manifest not parsed"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
