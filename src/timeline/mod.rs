//! Timeline resolution.
//!
//! Both halves are pure functions: [`resolve`] picks the segment covering an
//! instant, [`seek`] picks the offset inside a loaded segment.

mod resolver;
mod seeker;

pub use camsync_common::{Fragment, TimelinePosition, Timestamp, MS_PER_DAY};
pub use resolver::resolve;
pub use seeker::seek;
