// Extraction-binary provider - runs `yt-dlp` locally
//
// The endpoint address is the binary path. Lookups use `--dump-json`,
// search and playlists use `--flat-playlist --dump-single-json`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::resolver::errors::ProviderError;
use crate::resolver::raw::{
    lenient_string, lenient_u64, lenient_vec, AudioTier, RawPlaylist, RawPlaylistEntry,
    RawSearchHit, RawThumbnail, RawVideo, StreamDescriptor, StreamRole, VideoMetadata,
};
use crate::resolver::traits::{ProviderEndpoint, VideoProvider};
use crate::resolver::utils::{is_absolute_url, run_output_with_timeout};

/// Muxed 360p format the site serves by default
const DEFAULT_COMBINED_FORMAT_ID: &str = "18";

pub struct YtDlpProvider {
    endpoint: ProviderEndpoint,
    proxy: Option<String>,
    search_limit: usize,
}

impl YtDlpProvider {
    pub fn new(endpoint: ProviderEndpoint) -> Self {
        Self {
            endpoint,
            proxy: None,
            search_limit: 20,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Common arguments, then the mode-specific ones, then the target
    fn build_args(&self, mode: &[&str], target: String, timeout: Duration) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            timeout.as_secs().max(1).to_string(),
        ];
        args.extend(mode.iter().map(|a| a.to_string()));

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(target);
        args
    }

    async fn run_json<T: serde::de::DeserializeOwned>(
        &self,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<T, ProviderError> {
        tracing::debug!(binary = %self.endpoint.address, args = %args.join(" "), "running extractor");

        let output = run_output_with_timeout(&self.endpoint.address, args, timeout).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::from_stderr(&stderr, timeout));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::Parse(format!("Invalid JSON: {}", e)))
    }
}

#[async_trait]
impl VideoProvider for YtDlpProvider {
    fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }

    async fn fetch_video(&self, id: &str, timeout: Duration) -> Result<RawVideo, ProviderError> {
        let args = self.build_args(
            &["--dump-json", "--no-playlist"],
            format!("https://www.youtube.com/watch?v={}", id),
            timeout,
        );
        let video: YtDlpVideo = self.run_json(args, timeout).await?;
        Ok(RawVideo::YtDlp(video))
    }

    async fn search(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<RawSearchHit>, ProviderError> {
        let args = self.build_args(
            &["--flat-playlist", "--dump-single-json"],
            format!("ytsearch{}:{}", self.search_limit, query),
            timeout,
        );
        let listing: YtDlpListing = self.run_json(args, timeout).await?;

        Ok(listing
            .entries
            .into_iter()
            .map(|entry| RawSearchHit {
                thumbnails: entry.thumbnails(),
                id: entry.id,
                title: entry.title,
                author: entry.channel.or(entry.uploader),
                view_count: entry.view_count,
                length_seconds: entry.duration,
            })
            .collect())
    }

    async fn fetch_playlist(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<RawPlaylist, ProviderError> {
        let args = self.build_args(
            &["--flat-playlist", "--dump-single-json"],
            format!("https://www.youtube.com/playlist?list={}", id),
            timeout,
        );
        let listing: YtDlpListing = self.run_json(args, timeout).await?;

        Ok(RawPlaylist {
            id: listing.id,
            title: listing.title,
            author: listing.channel.or(listing.uploader),
            video_count: listing.playlist_count,
            entries: listing
                .entries
                .into_iter()
                .map(|entry| RawPlaylistEntry {
                    // Largest thumbnail last
                    thumbnail: entry.thumbnails().pop().map(|t| t.url),
                    id: entry.id,
                    title: entry.title,
                })
                .collect(),
        })
    }

    async fn probe(&self, timeout: Duration) -> Result<(), ProviderError> {
        let output =
            run_output_with_timeout(&self.endpoint.address, vec!["--version".to_string()], timeout)
                .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ProviderError::from_stderr(
                &String::from_utf8_lossy(&output.stderr),
                timeout,
            ))
        }
    }
}

// ============================================================================
// Output types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YtDlpFormat {
    #[serde(deserialize_with = "lenient_string")]
    pub format_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub ext: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub vcodec: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub acodec: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub fps: Option<u64>,
    /// Total bitrate in kbps
    #[serde(deserialize_with = "lenient_u64")]
    pub tbr: Option<u64>,
    /// Audio bitrate in kbps
    #[serde(deserialize_with = "lenient_u64")]
    pub abr: Option<u64>,
    /// `1080p`, `medium`, `low`, ...
    #[serde(deserialize_with = "lenient_string")]
    pub format_note: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub protocol: Option<String>,
}

impl YtDlpFormat {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|v| v != "none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|a| a != "none")
    }

    /// Direct progressive downloads only; manifests and storyboards are skipped
    fn is_direct(&self) -> bool {
        matches!(self.protocol.as_deref(), None | Some("https") | Some("http"))
    }

    fn label(&self) -> Option<String> {
        let note = self.format_note.as_deref().unwrap_or_default();
        if crate::resolver::raw::parse_label(note).is_some() {
            return Some(note.to_string());
        }
        let height = self.height?;
        match self.fps {
            Some(fps) if fps > 30 => Some(format!("{}p{}", height, fps)),
            _ => Some(format!("{}p", height)),
        }
    }

    fn descriptor(&self) -> Option<StreamDescriptor> {
        if !self.is_direct() {
            return None;
        }
        let role = match (self.has_video(), self.has_audio()) {
            (true, true) => StreamRole::Combined,
            (true, false) => StreamRole::VideoOnly,
            (false, true) => StreamRole::AudioOnly,
            (false, false) => return None,
        };
        let audio_tier = match role {
            StreamRole::AudioOnly => self
                .format_note
                .as_deref()
                .and_then(AudioTier::from_hint)
                .or_else(|| kbps_to_bps(self.abr).map(AudioTier::from_bitrate)),
            _ => None,
        };

        Some(StreamDescriptor {
            url: self.url.clone()?,
            role,
            resolution: if role == StreamRole::AudioOnly {
                None
            } else {
                self.label()
            },
            container: self.ext.as_deref().map(str::to_ascii_lowercase),
            bitrate: kbps_to_bps(self.tbr.or(self.abr)),
            audio_tier,
            is_default: role == StreamRole::Combined
                && self.format_id.as_deref() == Some(DEFAULT_COMBINED_FORMAT_ID),
        })
    }
}

/// Nonsensical bitrates that overflow read as absent
fn kbps_to_bps(kbps: Option<u64>) -> Option<u64> {
    kbps?.checked_mul(1000)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YtDlpThumbnail {
    #[serde(deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub width: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YtDlpVideo {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub uploader: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub channel: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub channel_id: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub view_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub like_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub duration: Option<u64>,
    /// `YYYYMMDD`
    #[serde(deserialize_with = "lenient_string")]
    pub upload_date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub thumbnail: Option<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub formats: Vec<YtDlpFormat>,
}

impl YtDlpVideo {
    pub fn streams(&self) -> Vec<StreamDescriptor> {
        self.formats
            .iter()
            .filter_map(YtDlpFormat::descriptor)
            .collect()
    }

    pub fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            title: self.title.clone(),
            author: self.channel.clone().or_else(|| self.uploader.clone()),
            author_id: self.channel_id.clone(),
            // Not part of the extractor output
            author_thumbnail: None,
            view_count: self.view_count,
            like_count: self.like_count,
            description: self.description.clone(),
            duration_seconds: self.duration,
            thumbnail: self.thumbnail.clone(),
            upload_date: self
                .upload_date
                .clone()
                .filter(|d| d.len() == 8 && d.bytes().all(|b| b.is_ascii_digit())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct YtDlpEntry {
    #[serde(deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    channel: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    uploader: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    view_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    duration: Option<u64>,
    #[serde(deserialize_with = "lenient_vec")]
    thumbnails: Vec<YtDlpThumbnail>,
}

impl YtDlpEntry {
    fn thumbnails(&self) -> Vec<RawThumbnail> {
        self.thumbnails
            .iter()
            .filter_map(|t| {
                let url = t.url.as_deref().filter(|u| is_absolute_url(u))?;
                Some(RawThumbnail {
                    url: url.to_string(),
                    width: t.width.map(|w| w as u32),
                    height: t.height.map(|h| h as u32),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct YtDlpListing {
    #[serde(deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    channel: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    uploader: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    playlist_count: Option<u64>,
    #[serde(deserialize_with = "lenient_vec")]
    entries: Vec<YtDlpEntry>,
}
