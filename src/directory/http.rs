use async_trait::async_trait;
use camsync_common::{CameraId, Error, Result};
use chrono::NaiveDate;
use regex::Regex;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;
use std::sync::OnceLock;

use super::{on_date, DirectoryListing, DirectoryService};
use crate::config::DirectoryConfig;

/// Directory client for HTTP auto-index pages.
///
/// Understands the HTML listings produced by nginx/`http-server` style
/// servers and nginx's `autoindex_format json`.
pub struct HttpDirectory {
    client: Client,
    base_url: String,
    config: DirectoryConfig,
}

#[derive(Debug, Deserialize)]
struct JsonIndexEntry {
    name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl HttpDirectory {
    pub fn new(config: &DirectoryConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self::with_client(client, config)
    }

    /// Share an existing client (and its connection pool).
    pub fn with_client(client: Client, config: &DirectoryConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        }
    }

    fn camera_url(&self, camera: CameraId) -> String {
        format!("{}/{}", self.base_url, self.config.camera_dir_for(camera))
    }
}

#[async_trait]
impl DirectoryService for HttpDirectory {
    async fn list(&self, camera: CameraId, date: NaiveDate) -> Result<DirectoryListing> {
        let base = self.camera_url(camera);
        let url = format!("{}/", base);

        tracing::debug!(camera = %camera, url = %url, "Fetching recordings listing");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::directory_unreachable(camera, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::directory_unreachable(
                camera,
                format!("GET {} returned {}", url, response.status()),
            ));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));

        let body = response
            .text()
            .await
            .map_err(|e| Error::directory_unreachable(camera, e.to_string()))?;

        let names = if is_json {
            parse_json_index(&body)
                .map_err(|e| Error::directory_unreachable(camera, e.to_string()))?
        } else {
            parse_html_index(&body)
        };

        let mut identifiers: Vec<String> =
            names.into_iter().filter(|n| on_date(n, date)).collect();
        identifiers.sort();
        identifiers.dedup();

        Ok(DirectoryListing {
            base,
            playlist_name: self.config.playlist_name.clone(),
            identifiers,
        })
    }
}

fn anchor_regex() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    ANCHOR.get_or_init(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a>").expect("valid anchor regex"))
}

/// Link texts of an HTML auto-index page, trailing `/` stripped.
fn parse_html_index(body: &str) -> Vec<String> {
    anchor_regex()
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_end_matches('/').to_string())
        .filter(|name| !name.is_empty() && name != "..")
        .collect()
}

/// Directory names of an nginx JSON auto-index.
fn parse_json_index(body: &str) -> serde_json::Result<Vec<String>> {
    let entries: Vec<JsonIndexEntry> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .filter(|e| e.kind.as_deref().map_or(true, |k| k == "directory"))
        .map(|e| e.name.trim_end_matches('/').to_string())
        .collect())
}
