// Privacy mirror API provider (`/streams/{id}`)

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
use crate::resolver::utils::{compact_date_from_iso, get_json, get_ok, is_absolute_url, join_url};

pub struct PipedProvider {
    endpoint: ProviderEndpoint,
    client: reqwest::Client,
}

impl PipedProvider {
    pub fn new(endpoint: ProviderEndpoint, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.endpoint.address, path)
    }
}

#[async_trait]
impl VideoProvider for PipedProvider {
    fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }

    async fn fetch_video(&self, id: &str, timeout: Duration) -> Result<RawVideo, ProviderError> {
        let url = self.url(&format!("/streams/{}", id));
        tracing::debug!(%url, "piped video lookup");

        let video: PipedVideo = get_json(&self.client, &url, &[], timeout).await?;
        if let Some(error) = video.error.as_deref() {
            return Err(ProviderError::Unavailable(error.to_string()));
        }
        Ok(RawVideo::Piped(video))
    }

    async fn search(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<RawSearchHit>, ProviderError> {
        let url = self.url("/search");
        let page: PipedSearchPage =
            get_json(&self.client, &url, &[("q", query), ("filter", "videos")], timeout).await?;

        Ok(page
            .items
            .into_iter()
            .filter(|item| item.kind.as_deref().map_or(true, |k| k == "stream"))
            .map(PipedSearchItem::into_hit)
            .collect())
    }

    async fn fetch_playlist(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<RawPlaylist, ProviderError> {
        let url = self.url(&format!("/playlists/{}", id));
        let playlist: PipedPlaylist = get_json(&self.client, &url, &[], timeout).await?;
        if let Some(error) = playlist.error.as_deref() {
            return Err(ProviderError::Unavailable(error.to_string()));
        }
        Ok(playlist.into_raw(id))
    }

    async fn probe(&self, timeout: Duration) -> Result<(), ProviderError> {
        get_ok(&self.client, &self.url("/healthcheck"), timeout).await
    }
}

/// `/watch?v=ID` -> `ID`
fn id_from_watch_url(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Mirror format names (`MPEG_4`, `WEBMA_OPUS`, ...) to container names
fn container_from_format(format: &str) -> Option<String> {
    let container = match format.to_ascii_uppercase().as_str() {
        "MPEG_4" => "mp4",
        "WEBM" => "webm",
        "M4A" => "m4a",
        "WEBMA" | "WEBMA_OPUS" => "webm",
        "V3GPP" => "3gp",
        _ => return None,
    };
    Some(container.to_string())
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipedStream {
    #[serde(deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub format: Option<String>,
    /// `1080p`, `720p60` for video, `128 kbps` for audio
    #[serde(deserialize_with = "lenient_string")]
    pub quality: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub mime_type: Option<String>,
    pub video_only: Option<bool>,
    #[serde(deserialize_with = "lenient_u64")]
    pub bitrate: Option<u64>,
}

impl PipedStream {
    fn container(&self) -> Option<String> {
        self.format
            .as_deref()
            .and_then(container_from_format)
            .or_else(|| self.mime_type.as_deref().and_then(container_from_mime))
    }

    fn audio_tier(&self) -> Option<AudioTier> {
        if let Some(bps) = self.bitrate {
            return Some(AudioTier::from_bitrate(bps));
        }
        // "128 kbps"
        let kbps: u64 = self
            .quality
            .as_deref()?
            .split_whitespace()
            .next()?
            .parse()
            .ok()?;
        kbps.checked_mul(1000).map(AudioTier::from_bitrate)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipedVideo {
    #[serde(deserialize_with = "lenient_string")]
    pub error: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub uploader: Option<String>,
    /// `/channel/UC...`
    #[serde(deserialize_with = "lenient_string")]
    pub uploader_url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub uploader_avatar: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub thumbnail_url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub upload_date: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub views: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub likes: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub duration: Option<u64>,
    #[serde(deserialize_with = "lenient_vec")]
    pub video_streams: Vec<PipedStream>,
    #[serde(deserialize_with = "lenient_vec")]
    pub audio_streams: Vec<PipedStream>,
}

impl PipedVideo {
    pub fn streams(&self) -> Vec<StreamDescriptor> {
        let video = self.video_streams.iter().filter_map(|s| {
            let role = if s.video_only.unwrap_or(false) {
                StreamRole::VideoOnly
            } else {
                StreamRole::Combined
            };
            Some(StreamDescriptor {
                url: s.url.clone()?,
                role,
                resolution: s.quality.clone(),
                container: s.container(),
                bitrate: s.bitrate,
                audio_tier: None,
                is_default: false,
            })
        });
        let audio = self.audio_streams.iter().filter_map(|s| {
            Some(StreamDescriptor {
                url: s.url.clone()?,
                role: StreamRole::AudioOnly,
                resolution: None,
                container: s.container(),
                bitrate: s.bitrate,
                audio_tier: s.audio_tier(),
                is_default: false,
            })
        });
        video.chain(audio).collect()
    }

    pub fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            title: self.title.clone(),
            author: self.uploader.clone(),
            author_id: self
                .uploader_url
                .as_deref()
                .map(|u| u.rsplit('/').next().unwrap_or(u).to_string())
                .filter(|id| !id.is_empty()),
            author_thumbnail: self.uploader_avatar.clone(),
            view_count: self.views,
            like_count: self.likes,
            description: self.description.clone(),
            duration_seconds: self.duration,
            thumbnail: self.thumbnail_url.clone(),
            upload_date: self.upload_date.as_deref().and_then(compact_date_from_iso),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PipedSearchItem {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    kind: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    thumbnail: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    uploader_name: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    views: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    duration: Option<u64>,
}

impl PipedSearchItem {
    fn into_hit(self) -> RawSearchHit {
        RawSearchHit {
            id: self.url.as_deref().and_then(id_from_watch_url),
            title: self.title,
            author: self.uploader_name,
            view_count: self.views,
            length_seconds: self.duration,
            thumbnails: self
                .thumbnail
                .filter(|u| is_absolute_url(u))
                .map(|url| RawThumbnail {
                    url,
                    width: None,
                    height: None,
                })
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PipedSearchPage {
    #[serde(deserialize_with = "lenient_vec")]
    items: Vec<PipedSearchItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PipedPlaylist {
    #[serde(deserialize_with = "lenient_string")]
    error: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    uploader: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    videos: Option<u64>,
    #[serde(deserialize_with = "lenient_vec")]
    related_streams: Vec<PipedSearchItem>,
}

impl PipedPlaylist {
    fn into_raw(self, id: &str) -> RawPlaylist {
        RawPlaylist {
            id: Some(id.to_string()),
            title: self.name,
            author: self.uploader,
            video_count: self.videos,
            entries: self
                .related_streams
                .into_iter()
                .map(|item| RawPlaylistEntry {
                    id: item.url.as_deref().and_then(id_from_watch_url),
                    title: item.title,
                    thumbnail: item.thumbnail,
                })
                .collect(),
        }
    }
}
