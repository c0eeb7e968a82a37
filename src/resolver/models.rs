// Client-facing response models

use serde::Serialize;

use super::raw::{RawPlaylist, RawSearchHit, RawThumbnail, VideoMetadata};
use super::utils::{format_duration, url_or_empty};

/// One entry of a quality list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamOption {
    pub url: String,
    /// Quality label (e.g., "1080p", "720p60")
    pub resolution: String,
    /// Container name, empty when the provider did not say
    pub container: String,
}

/// Normalized answer for a by-id lookup
///
/// Every URL field holds an absolute URL or the empty string. Counts the
/// provider did not report serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedVideoResult {
    pub video_id: String,
    pub combined_stream_url: String,
    pub high_res_video_only_url: String,
    pub audio_only_url: String,
    /// Video-only streams, highest resolution first
    pub video_only_streams: Vec<StreamOption>,
    /// Muxed streams, highest resolution first
    pub combined_streams: Vec<StreamOption>,
    pub title: String,
    pub author: String,
    pub author_id: String,
    pub author_thumbnail: String,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl From<RawThumbnail> for Thumbnail {
    fn from(raw: RawThumbnail) -> Self {
        Self {
            url: raw.url,
            width: raw.width.unwrap_or(0),
            height: raw.height.unwrap_or(0),
        }
    }
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub thumbnails: Vec<Thumbnail>,
    pub author: String,
    pub view_count: u64,
    /// `m:ss`
    pub duration_formatted: String,
}

impl SearchResultItem {
    /// Hits without an id or a title are dropped
    pub fn from_hit(hit: RawSearchHit) -> Option<Self> {
        let id = hit.id?;
        let title = hit.title?;

        Some(Self {
            url: format!("https://www.youtube.com/watch?v={}", id),
            id,
            title,
            thumbnails: hit.thumbnails.into_iter().map(Thumbnail::from).collect(),
            author: hit.author.unwrap_or_else(|| "Unknown".to_string()),
            view_count: hit.view_count.unwrap_or(0),
            duration_formatted: format_duration(hit.length_seconds.unwrap_or(0)),
        })
    }
}

/// Descriptive summary of one video, without streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub uploader: String,
    /// Seconds
    pub duration: Option<u64>,
    pub view_count: Option<u64>,
    /// `YYYYMMDD`
    pub upload_date: Option<String>,
}

impl VideoSummary {
    pub fn from_metadata(id: &str, meta: VideoMetadata) -> Self {
        Self {
            id: id.to_string(),
            title: meta.title.unwrap_or_default(),
            description: meta.description.unwrap_or_default(),
            thumbnail_url: url_or_empty(meta.thumbnail.as_deref()),
            uploader: meta.author.unwrap_or_default(),
            duration: meta.duration_seconds,
            view_count: meta.view_count,
            upload_date: meta.upload_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistVideo {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResult {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub video_count: u64,
    pub videos: Vec<PlaylistVideo>,
}

impl PlaylistResult {
    /// Entries without an id are dropped; untitled entries keep an empty title
    pub fn from_raw(requested_id: &str, raw: RawPlaylist) -> Self {
        let videos: Vec<PlaylistVideo> = raw
            .entries
            .into_iter()
            .filter_map(|entry| {
                Some(PlaylistVideo {
                    id: entry.id?,
                    title: entry.title.unwrap_or_default(),
                    thumbnail_url: entry
                        .thumbnail
                        .filter(|u| super::utils::is_absolute_url(u)),
                })
            })
            .collect();

        Self {
            id: raw.id.unwrap_or_else(|| requested_id.to_string()),
            title: raw.title.unwrap_or_default(),
            author: raw.author,
            video_count: raw.video_count.unwrap_or(videos.len() as u64),
            videos,
        }
    }
}
