//! HLS media playlist structures.

use chrono::{DateTime, Duration, Utc};
use std::fmt::Write;

use crate::error::{Error, Result};

/// Media playlist for a single rendition.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    /// Target duration in seconds.
    pub target_duration: u32,
    /// Media sequence number.
    pub media_sequence: u64,
    /// Playlist type (VOD, EVENT, or untagged live).
    pub playlist_type: PlaylistType,
    /// Segment entries.
    pub segments: Vec<SegmentEntry>,
    /// Whether this is an ended playlist.
    pub ended: bool,
}

impl MediaPlaylist {
    /// Create an empty VOD playlist.
    pub fn vod() -> Self {
        Self {
            target_duration: 10,
            media_sequence: 0,
            playlist_type: PlaylistType::Vod,
            segments: Vec::new(),
            ended: true,
        }
    }

    /// Parse M3U8 text.
    ///
    /// Unknown tags are ignored. Master playlists are rejected since a
    /// recording bucket is always a single rendition.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        match lines.next() {
            Some((_, "#EXTM3U")) => {}
            _ => return Err(Error::invalid_playlist("missing #EXTM3U header")),
        }

        let mut playlist = Self {
            target_duration: 0,
            media_sequence: 0,
            playlist_type: PlaylistType::Live,
            segments: Vec::new(),
            ended: false,
        };

        let mut pending_duration: Option<(f64, Option<String>)> = None;
        let mut pending_pdt: Option<DateTime<Utc>> = None;
        let mut pending_discontinuity = false;

        for (line_no, line) in lines {
            let invalid = || Error::InvalidTag {
                line: line_no,
                tag: line.to_string(),
            };

            if let Some(rest) = line.strip_prefix("#EXTINF:") {
                let (dur_str, title) = match rest.split_once(',') {
                    Some((d, t)) => (d, Some(t.trim()).filter(|t| !t.is_empty())),
                    None => (rest, None),
                };
                let duration = dur_str.trim().parse::<f64>().map_err(|_| invalid())?;
                if !duration.is_finite() || duration < 0.0 {
                    return Err(invalid());
                }
                pending_duration = Some((duration, title.map(str::to_string)));
            } else if let Some(rest) = line.strip_prefix("#EXT-X-PROGRAM-DATE-TIME:") {
                pending_pdt = Some(parse_program_date_time(rest).ok_or_else(invalid)?);
            } else if let Some(rest) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
                playlist.target_duration = rest.trim().parse().map_err(|_| invalid())?;
            } else if let Some(rest) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
                playlist.media_sequence = rest.trim().parse().map_err(|_| invalid())?;
            } else if let Some(rest) = line.strip_prefix("#EXT-X-PLAYLIST-TYPE:") {
                playlist.playlist_type = match rest.trim() {
                    "VOD" => PlaylistType::Vod,
                    "EVENT" => PlaylistType::Event,
                    _ => return Err(invalid()),
                };
            } else if line == "#EXT-X-DISCONTINUITY" {
                pending_discontinuity = true;
            } else if line == "#EXT-X-ENDLIST" {
                playlist.ended = true;
            } else if line.starts_with("#EXT-X-STREAM-INF") {
                return Err(Error::unsupported("master playlists"));
            } else if line.starts_with('#') {
                continue;
            } else {
                let (duration, title) = pending_duration.take().ok_or_else(|| {
                    Error::invalid_playlist(format!(
                        "segment URI without #EXTINF on line {line_no}"
                    ))
                })?;
                playlist.segments.push(SegmentEntry {
                    duration,
                    uri: line.to_string(),
                    title,
                    discontinuity: std::mem::take(&mut pending_discontinuity),
                    program_date_time: pending_pdt.take(),
                });
            }
        }

        Ok(playlist)
    }

    /// Sum of all declared segment durations, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Entries with their start offset and program date-time.
    ///
    /// Entries without an explicit `#EXT-X-PROGRAM-DATE-TIME` inherit one
    /// from the nearest tagged entry, shifted by the durations in between.
    /// When no entry is tagged every `program_date_time` is `None`.
    pub fn timed_entries(&self) -> Vec<TimedEntry> {
        let mut entries = Vec::with_capacity(self.segments.len());
        let mut start = 0.0;
        let mut carried: Option<DateTime<Utc>> = None;

        for segment in &self.segments {
            let pdt = segment.program_date_time.or(carried);
            entries.push(TimedEntry {
                start_secs: start,
                duration: segment.duration,
                program_date_time: pdt,
                uri: segment.uri.clone(),
            });
            carried = pdt.map(|t| t + secs(segment.duration));
            start += segment.duration;
        }

        // Leading entries before the first tag count backwards from it.
        if let Some(anchor) = entries.iter().position(|e| e.program_date_time.is_some()) {
            let anchor_start = entries[anchor].start_secs;
            if let Some(anchor_pdt) = entries[anchor].program_date_time {
                for entry in entries.iter_mut().take(anchor) {
                    entry.program_date_time =
                        Some(anchor_pdt - secs(anchor_start - entry.start_secs));
                }
            }
        }

        entries
    }

    /// Render to M3U8 string.
    pub fn render(&self) -> String {
        let mut out = String::new();

        writeln!(out, "#EXTM3U").unwrap();
        writeln!(out, "#EXT-X-VERSION:3").unwrap();
        writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration).unwrap();
        writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence).unwrap();

        match self.playlist_type {
            PlaylistType::Vod => writeln!(out, "#EXT-X-PLAYLIST-TYPE:VOD").unwrap(),
            PlaylistType::Event => writeln!(out, "#EXT-X-PLAYLIST-TYPE:EVENT").unwrap(),
            PlaylistType::Live => {}
        }

        for segment in &self.segments {
            if segment.discontinuity {
                writeln!(out, "#EXT-X-DISCONTINUITY").unwrap();
            }
            if let Some(ref pdt) = segment.program_date_time {
                writeln!(
                    out,
                    "#EXT-X-PROGRAM-DATE-TIME:{}",
                    pdt.format("%Y-%m-%dT%H:%M:%S%.3f%:z")
                )
                .unwrap();
            }
            if let Some(ref title) = segment.title {
                writeln!(out, "#EXTINF:{:.6},{}", segment.duration, title).unwrap();
            } else {
                writeln!(out, "#EXTINF:{:.6},", segment.duration).unwrap();
            }
            writeln!(out, "{}", segment.uri).unwrap();
        }

        if self.ended {
            writeln!(out, "#EXT-X-ENDLIST").unwrap();
        }

        out
    }
}

/// Playlist type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Vod,
    Event,
    Live,
}

/// A segment entry in the playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEntry {
    /// Duration in seconds.
    pub duration: f64,
    /// Segment URI.
    pub uri: String,
    /// Optional title.
    pub title: Option<String>,
    /// Discontinuity before this segment.
    pub discontinuity: bool,
    /// Explicit program date-time tag preceding this segment.
    pub program_date_time: Option<DateTime<Utc>>,
}

/// A segment entry placed on the playlist's media timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEntry {
    /// Offset of the entry from the start of the playlist, in seconds.
    pub start_secs: f64,
    /// Duration in seconds.
    pub duration: f64,
    /// Wall-clock time of the entry's first frame, explicit or interpolated.
    pub program_date_time: Option<DateTime<Utc>>,
    /// Segment URI.
    pub uri: String,
}

fn secs(value: f64) -> Duration {
    Duration::milliseconds((value * 1000.0).round() as i64)
}

/// ffmpeg writes `+0000` offsets, which RFC 3339 does not allow.
fn parse_program_date_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
