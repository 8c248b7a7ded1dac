use async_trait::async_trait;
use camsync_common::{CameraId, Error, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

use super::{on_date, DirectoryListing, DirectoryService};
use crate::config::DirectoryConfig;

/// Directory client reading a recordings tree on local disk.
pub struct FsDirectory {
    root: PathBuf,
    config: DirectoryConfig,
}

impl FsDirectory {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            root: config.root.clone().unwrap_or_else(|| PathBuf::from(".")),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl DirectoryService for FsDirectory {
    async fn list(&self, camera: CameraId, date: NaiveDate) -> Result<DirectoryListing> {
        let dir = self.root.join(self.config.camera_dir_for(camera));

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::directory_unreachable(camera, format!("{:?}: {}", dir, e)))?;

        let mut identifiers = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if on_date(&name, date) {
                identifiers.push(name);
            }
        }
        identifiers.sort();

        Ok(DirectoryListing {
            base: dir.to_string_lossy().into_owned(),
            playlist_name: self.config.playlist_name.clone(),
            identifiers,
        })
    }
}
