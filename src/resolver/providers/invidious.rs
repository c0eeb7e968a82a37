// Public instance API provider (`/api/v1/...`)

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::resolver::errors::ProviderError;
use crate::resolver::raw::{
    container_from_mime, lenient_string, lenient_u64, lenient_vec, AudioTier, RawPlaylist,
    RawPlaylistEntry, RawSearchHit, RawThumbnail, RawVideo, StreamDescriptor, StreamRole,
    VideoMetadata,
};
use crate::resolver::traits::{ProviderEndpoint, VideoProvider};
use crate::resolver::utils::{absolute_url, compact_date_from_unix, get_json, get_ok, join_url};

/// Client for one instance of the public instance API
pub struct InvidiousProvider {
    endpoint: ProviderEndpoint,
    client: reqwest::Client,
}

impl InvidiousProvider {
    pub fn new(endpoint: ProviderEndpoint, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.endpoint.address, path)
    }
}

#[async_trait]
impl VideoProvider for InvidiousProvider {
    fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }

    async fn fetch_video(&self, id: &str, timeout: Duration) -> Result<RawVideo, ProviderError> {
        let url = self.url(&format!("/api/v1/videos/{}", id));
        tracing::debug!(%url, "invidious video lookup");

        let video: InvidiousVideo = get_json(&self.client, &url, &[], timeout).await?;
        if let Some(error) = video.error.as_deref() {
            return Err(ProviderError::Unavailable(error.to_string()));
        }
        Ok(RawVideo::Invidious(video))
    }

    async fn search(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<RawSearchHit>, ProviderError> {
        let url = self.url("/api/v1/search");
        let items: Vec<InvidiousSearchItem> =
            get_json(&self.client, &url, &[("q", query), ("type", "video")], timeout).await?;

        Ok(items
            .into_iter()
            .filter(|item| item.kind.as_deref().map_or(true, |k| k == "video"))
            .map(InvidiousSearchItem::into_hit)
            .collect())
    }

    async fn fetch_playlist(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<RawPlaylist, ProviderError> {
        let url = self.url(&format!("/api/v1/playlists/{}", id));
        let playlist: InvidiousPlaylist = get_json(&self.client, &url, &[], timeout).await?;
        if let Some(error) = playlist.error.as_deref() {
            return Err(ProviderError::Unavailable(error.to_string()));
        }
        Ok(playlist.into_raw())
    }

    async fn probe(&self, timeout: Duration) -> Result<(), ProviderError> {
        get_ok(&self.client, &self.url("/api/v1/stats"), timeout).await
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvidiousImage {
    #[serde(deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub width: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
}

impl InvidiousImage {
    fn to_thumbnail(&self) -> Option<RawThumbnail> {
        let url = self.url.as_deref().and_then(absolute_url)?;
        Some(RawThumbnail {
            url,
            width: self.width.map(|w| w as u32),
            height: self.height.map(|h| h as u32),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvidiousStream {
    #[serde(deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    pub mime_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub container: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub resolution: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub quality_label: Option<String>,
    /// `medium`, `hd720`, ... on muxed streams
    #[serde(deserialize_with = "lenient_string")]
    pub quality: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub audio_quality: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub bitrate: Option<u64>,
}

impl InvidiousStream {
    fn is_audio(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|t| t.trim_start().starts_with("audio/"))
            || (self.audio_quality.is_some() && self.resolution.is_none())
    }

    fn descriptor(&self, role: StreamRole) -> Option<StreamDescriptor> {
        let url = self.url.clone()?;
        let container = self
            .container
            .as_deref()
            .map(str::to_ascii_lowercase)
            .or_else(|| self.mime_type.as_deref().and_then(container_from_mime));
        let resolution = match role {
            StreamRole::AudioOnly => None,
            _ => self.resolution.clone().or_else(|| self.quality_label.clone()),
        };
        let audio_tier = match role {
            StreamRole::AudioOnly => self
                .audio_quality
                .as_deref()
                .and_then(AudioTier::from_hint)
                .or_else(|| self.bitrate.map(AudioTier::from_bitrate)),
            _ => None,
        };

        Some(StreamDescriptor {
            url,
            role,
            resolution,
            container,
            bitrate: self.bitrate,
            audio_tier,
            is_default: role == StreamRole::Combined
                && self.quality.as_deref() == Some("medium"),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvidiousVideo {
    #[serde(deserialize_with = "lenient_string")]
    pub error: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description_html: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub author_id: Option<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub author_thumbnails: Vec<InvidiousImage>,
    #[serde(deserialize_with = "lenient_vec")]
    pub video_thumbnails: Vec<InvidiousImage>,
    #[serde(deserialize_with = "lenient_u64")]
    pub view_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub like_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub length_seconds: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub published: Option<u64>,
    #[serde(deserialize_with = "lenient_vec")]
    pub format_streams: Vec<InvidiousStream>,
    #[serde(deserialize_with = "lenient_vec")]
    pub adaptive_formats: Vec<InvidiousStream>,
}

impl InvidiousVideo {
    pub fn streams(&self) -> Vec<StreamDescriptor> {
        let combined = self
            .format_streams
            .iter()
            .filter_map(|s| s.descriptor(StreamRole::Combined));
        let adaptive = self.adaptive_formats.iter().filter_map(|s| {
            let role = if s.is_audio() {
                StreamRole::AudioOnly
            } else {
                StreamRole::VideoOnly
            };
            s.descriptor(role)
        });
        combined.chain(adaptive).collect()
    }

    pub fn metadata(&self) -> VideoMetadata {
        // The largest avatar comes last
        let author_thumbnail = self
            .author_thumbnails
            .iter()
            .rev()
            .find_map(InvidiousImage::to_thumbnail)
            .map(|t| t.url);
        let thumbnail = self
            .video_thumbnails
            .iter()
            .find_map(InvidiousImage::to_thumbnail)
            .map(|t| t.url);

        VideoMetadata {
            title: self.title.clone(),
            author: self.author.clone(),
            author_id: self.author_id.clone(),
            author_thumbnail,
            view_count: self.view_count,
            like_count: self.like_count,
            description: self
                .description
                .clone()
                .or_else(|| self.description_html.clone()),
            duration_seconds: self.length_seconds,
            thumbnail,
            upload_date: self
                .published
                .and_then(|p| compact_date_from_unix(p as i64)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InvidiousSearchItem {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    kind: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    video_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    author: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    view_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    length_seconds: Option<u64>,
    #[serde(deserialize_with = "lenient_vec")]
    video_thumbnails: Vec<InvidiousImage>,
}

impl InvidiousSearchItem {
    fn into_hit(self) -> RawSearchHit {
        RawSearchHit {
            id: self.video_id,
            title: self.title,
            author: self.author,
            view_count: self.view_count,
            length_seconds: self.length_seconds,
            thumbnails: self
                .video_thumbnails
                .iter()
                .filter_map(InvidiousImage::to_thumbnail)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InvidiousPlaylistVideo {
    #[serde(deserialize_with = "lenient_string")]
    video_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient_vec")]
    video_thumbnails: Vec<InvidiousImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InvidiousPlaylist {
    #[serde(deserialize_with = "lenient_string")]
    error: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    playlist_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    author: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    video_count: Option<u64>,
    #[serde(deserialize_with = "lenient_vec")]
    videos: Vec<InvidiousPlaylistVideo>,
}

impl InvidiousPlaylist {
    fn into_raw(self) -> RawPlaylist {
        RawPlaylist {
            id: self.playlist_id,
            title: self.title,
            author: self.author,
            video_count: self.video_count,
            entries: self
                .videos
                .into_iter()
                .map(|v| RawPlaylistEntry {
                    id: v.video_id,
                    title: v.title,
                    // Largest thumbnail last
                    thumbnail: v
                        .video_thumbnails
                        .iter()
                        .rev()
                        .find_map(InvidiousImage::to_thumbnail)
                        .map(|t| t.url),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> InvidiousVideo {
        serde_json::from_value(json!({
            "title": "Sample",
            "author": "Someone",
            "authorId": "UC123",
            "authorThumbnails": [
                {"url": "https://img.example/a32.jpg", "width": 32, "height": 32},
                {"url": "https://img.example/a176.jpg", "width": 176, "height": 176}
            ],
            "viewCount": 1000,
            "likeCount": "12",
            "lengthSeconds": 212,
            "published": 1256453853,
            "formatStreams": [
                {"url": "https://v.example/18", "type": "video/mp4", "quality": "medium",
                 "container": "mp4", "resolution": "360p"}
            ],
            "adaptiveFormats": [
                {"url": "https://v.example/248", "type": "video/webm; codecs=\"vp9\"",
                 "container": "webm", "resolution": "1080p", "bitrate": "2500000"},
                {"url": "https://v.example/140", "type": "audio/mp4; codecs=\"mp4a.40.2\"",
                 "container": "m4a", "audioQuality": "AUDIO_QUALITY_MEDIUM", "bitrate": "130000"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_stream_roles() {
        let streams = sample().streams();
        assert_eq!(streams.len(), 3);

        assert_eq!(streams[0].role, StreamRole::Combined);
        assert!(streams[0].is_default);

        assert_eq!(streams[1].role, StreamRole::VideoOnly);
        assert_eq!(streams[1].resolution.as_deref(), Some("1080p"));
        assert_eq!(streams[1].bitrate, Some(2_500_000));

        assert_eq!(streams[2].role, StreamRole::AudioOnly);
        assert_eq!(streams[2].audio_tier, Some(AudioTier::Medium));
        assert_eq!(streams[2].container.as_deref(), Some("m4a"));
    }

    #[test]
    fn test_metadata_mapping() {
        let meta = sample().metadata();
        assert_eq!(meta.author_thumbnail.as_deref(), Some("https://img.example/a176.jpg"));
        assert_eq!(meta.like_count, Some(12));
        assert_eq!(meta.upload_date.as_deref(), Some("20091025"));
    }

    #[test]
    fn test_protocol_relative_avatar() {
        let video: InvidiousVideo = serde_json::from_value(json!({
            "title": "x",
            "authorThumbnails": [
                {"url": "//yt3.ggpht.com/avatar=s176", "width": 176, "height": 176}
            ]
        }))
        .unwrap();
        assert_eq!(
            video.metadata().author_thumbnail.as_deref(),
            Some("https://yt3.ggpht.com/avatar=s176")
        );
    }

    #[test]
    fn test_missing_fields_are_tolerated() {
        let video: InvidiousVideo =
            serde_json::from_value(json!({"formatStreams": null, "viewCount": "n/a"})).unwrap();
        assert!(video.streams().is_empty());
        assert_eq!(video.metadata().view_count, None);
    }
}
