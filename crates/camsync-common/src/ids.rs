//! Typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// 1-based camera number, stable for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CameraId(u8);

impl CameraId {
    /// Create a camera id. Zero is rejected.
    pub fn new(id: u8) -> Result<Self> {
        if id == 0 {
            return Err(Error::invalid_input("camera ids start at 1"));
        }
        Ok(Self(id))
    }

    /// The raw camera number.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based slot for arena indexing.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// All ids from 1 through `count`.
    pub fn range(count: u8) -> impl Iterator<Item = CameraId> {
        (1..=count).map(CameraId)
    }
}

impl TryFrom<u8> for CameraId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CameraId> for u8 {
    fn from(id: CameraId) -> Self {
        id.0
    }
}

impl FromStr for CameraId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s
            .trim()
            .trim_start_matches("cam")
            .parse::<u8>()
            .map_err(|_| Error::invalid_input(format!("not a camera id: {s}")))?;
        Self::new(raw)
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_id_rejects_zero() {
        assert!(CameraId::new(0).is_err());
        assert_eq!(CameraId::new(4).unwrap().get(), 4);
    }

    #[test]
    fn test_camera_id_index() {
        assert_eq!(CameraId::new(1).unwrap().index(), 0);
        assert_eq!(CameraId::new(4).unwrap().index(), 3);
    }

    #[test]
    fn test_camera_id_range() {
        let ids: Vec<u8> = CameraId::range(4).map(CameraId::get).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_camera_id_from_str() {
        assert_eq!("3".parse::<CameraId>().unwrap().get(), 3);
        assert_eq!("cam2".parse::<CameraId>().unwrap().get(), 2);
        assert!("cam0".parse::<CameraId>().is_err());
        assert!("front".parse::<CameraId>().is_err());
    }

    #[test]
    fn test_camera_id_serde() {
        let id = CameraId::new(2).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "2");
        let back: CameraId = serde_json::from_str("2").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<CameraId>("0").is_err());
    }
}
