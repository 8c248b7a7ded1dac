use camsync_common::{Error, Fragment, Result};
use camsync_media::MediaPlaylist;
use reqwest::Client;
use std::time::Duration;

/// Fetches segment manifests over HTTP or from local disk.
#[derive(Clone)]
pub struct ManifestClient {
    client: Client,
}

impl ManifestClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with timeout: {}", e);
            Client::new()
        });

        Self { client }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Raw manifest text for `url`.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::manifest_unavailable(url, e.to_string()))?;

            if !response.status().is_success() {
                return Err(Error::manifest_unavailable(
                    url,
                    format!("HTTP {}", response.status()),
                ));
            }

            response
                .text()
                .await
                .map_err(|e| Error::manifest_unavailable(url, e.to_string()))
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| Error::manifest_unavailable(url, e.to_string()))
        }
    }

    /// Fetch and parse the media playlist at `url`.
    pub async fn fetch(&self, url: &str) -> Result<MediaPlaylist> {
        let text = self.fetch_text(url).await?;
        MediaPlaylist::parse(&text).map_err(|e| Error::manifest_unavailable(url, e.to_string()))
    }
}

/// Seekable fragments of a playlist.
///
/// Entries whose program date-time cannot be established are skipped.
pub fn fragments_of(playlist: &MediaPlaylist) -> Vec<Fragment> {
    playlist
        .timed_entries()
        .into_iter()
        .filter_map(|e| Some(Fragment::new(e.program_date_time?, e.start_secs)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:10\n\
#EXT-X-PROGRAM-DATE-TIME:2024-05-01T09:00:00.000+0000\n\
#EXTINF:10.0,\n\
seg0.ts\n\
#EXTINF:10.0,\n\
seg1.ts\n\
#EXT-X-ENDLIST\n";

    #[test]
    fn test_fragments_of() {
        let playlist = MediaPlaylist::parse(PLAYLIST).unwrap();
        let fragments = fragments_of(&playlist);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1].start_secs, 10.0);
        assert_eq!(
            fragments[1].program_date_time,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 10).unwrap()
        );
    }

    #[test]
    fn test_fragments_of_without_timestamps() {
        let playlist =
            MediaPlaylist::parse("#EXTM3U\n#EXTINF:4.0,\na.ts\n#EXT-X-ENDLIST\n").unwrap();
        assert!(fragments_of(&playlist).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cam1/2024-05-01_09-00-00/playlist.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
            .mount(&server)
            .await;

        let client = ManifestClient::new(Duration::from_secs(5));
        let url = format!("{}/cam1/2024-05-01_09-00-00/playlist.m3u8", server.uri());
        let playlist = client.fetch(&url).await.unwrap();
        assert_eq!(playlist.total_duration(), 20.0);
    }

    #[tokio::test]
    async fn test_fetch_http_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ManifestClient::new(Duration::from_secs(5));
        let result = client.fetch(&format!("{}/missing.m3u8", server.uri())).await;
        assert_matches!(result, Err(Error::ManifestUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("playlist.m3u8");
        std::fs::write(&file, PLAYLIST).unwrap();

        let client = ManifestClient::new(Duration::from_secs(5));
        let playlist = client.fetch(file.to_str().unwrap()).await.unwrap();
        assert_eq!(playlist.segments.len(), 2);

        let garbage = tmp.path().join("bad.m3u8");
        std::fs::write(&garbage, "not a playlist").unwrap();
        assert_matches!(
            client.fetch(garbage.to_str().unwrap()).await,
            Err(Error::ManifestUnavailable { .. })
        );
    }
}
