// FormatSelector - maps provider streams into the normalized result
//
// The same rules apply to every provider kind:
// - Combined: provider default, else best by bitrate then height
// - High-res video-only: target height, exact label then preferred container
// - Audio-only: target tier, preferred container first
// - Quality lists: one entry per label, highest resolution first

use std::cmp::Reverse;

use super::models::{NormalizedVideoResult, StreamOption};
use super::raw::{parse_label, AudioTier, RawVideo, StreamDescriptor, StreamRole};
use super::utils::url_or_empty;

/// Stream selection targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionConfig {
    /// Quality label for `highResVideoOnlyUrl` (e.g., "1080p")
    pub video_label: String,
    /// Preferred container for video-only streams
    pub video_container: String,
    pub audio_tier: AudioTier,
    /// Preferred container for audio-only streams
    pub audio_container: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            video_label: "1080p".to_string(),
            video_container: "webm".to_string(),
            audio_tier: AudioTier::Medium,
            audio_container: "m4a".to_string(),
        }
    }
}

impl SelectionConfig {
    pub fn with_video_label(mut self, label: impl Into<String>) -> Self {
        self.video_label = label.into();
        self
    }

    pub fn with_video_container(mut self, container: impl Into<String>) -> Self {
        self.video_container = container.into();
        self
    }

    pub fn with_audio_tier(mut self, tier: AudioTier) -> Self {
        self.audio_tier = tier;
        self
    }

    pub fn with_audio_container(mut self, container: impl Into<String>) -> Self {
        self.audio_container = container.into();
        self
    }
}

/// Stream selector
#[derive(Debug, Clone, Default)]
pub struct FormatSelector {
    config: SelectionConfig,
}

impl FormatSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Build the client-facing result from one provider answer
    pub fn normalize(&self, video_id: &str, raw: &RawVideo) -> NormalizedVideoResult {
        let streams = raw.streams();
        let meta = raw.metadata();

        NormalizedVideoResult {
            video_id: video_id.to_string(),
            combined_stream_url: Self::select_combined(&streams)
                .map(|s| s.url.trim().to_string())
                .unwrap_or_default(),
            high_res_video_only_url: self
                .select_high_res(&streams)
                .map(|s| s.url.trim().to_string())
                .unwrap_or_default(),
            audio_only_url: self
                .select_audio(&streams)
                .map(|s| s.url.trim().to_string())
                .unwrap_or_default(),
            video_only_streams: Self::quality_list(
                &streams,
                StreamRole::VideoOnly,
                &self.config.video_container,
            ),
            combined_streams: Self::quality_list(
                &streams,
                StreamRole::Combined,
                &self.config.video_container,
            ),
            title: meta.title.unwrap_or_default(),
            author: meta.author.unwrap_or_default(),
            author_id: meta.author_id.unwrap_or_default(),
            author_thumbnail: url_or_empty(meta.author_thumbnail.as_deref()),
            view_count: meta.view_count,
            like_count: meta.like_count,
            description: meta.description.unwrap_or_default(),
        }
    }

    fn playable(
        streams: &[StreamDescriptor],
        role: StreamRole,
    ) -> impl Iterator<Item = &StreamDescriptor> {
        streams
            .iter()
            .filter(move |s| s.role == role && s.is_playable())
    }

    /// Provider default first, else highest bitrate, then highest resolution
    pub fn select_combined(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
        if let Some(default) = Self::playable(streams, StreamRole::Combined).find(|s| s.is_default)
        {
            return Some(default);
        }

        // min_by_key keeps the first of equal candidates
        Self::playable(streams, StreamRole::Combined)
            .min_by_key(|s| Reverse((s.bitrate.unwrap_or(0), s.height().unwrap_or(0))))
    }

    /// Video-only stream at the target height; the exact label wins over
    /// frame-rate variants (`1080p` before `1080p60`), then the preferred
    /// container, then any container
    pub fn select_high_res<'a>(
        &self,
        streams: &'a [StreamDescriptor],
    ) -> Option<&'a StreamDescriptor> {
        let label = self.config.video_label.trim();
        let target_height = parse_label(label).map(|(height, _)| height);
        let is_exact = |s: &StreamDescriptor| {
            s.resolution
                .as_deref()
                .is_some_and(|r| r.trim().eq_ignore_ascii_case(label))
        };

        let at_height: Vec<&StreamDescriptor> = Self::playable(streams, StreamRole::VideoOnly)
            .filter(|s| match target_height {
                Some(height) => s.height() == Some(height),
                None => is_exact(s),
            })
            .collect();

        let exact: Vec<&StreamDescriptor> =
            at_height.iter().copied().filter(|s| is_exact(s)).collect();

        Self::prefer_container(&exact, &self.config.video_container)
            .or_else(|| Self::prefer_container(&at_height, &self.config.video_container))
    }

    /// Audio-only stream at the target tier, same container fallback
    pub fn select_audio<'a>(&self, streams: &'a [StreamDescriptor]) -> Option<&'a StreamDescriptor> {
        let at_tier: Vec<&StreamDescriptor> = Self::playable(streams, StreamRole::AudioOnly)
            .filter(|s| Self::audio_tier(s) == Some(self.config.audio_tier))
            .collect();

        Self::prefer_container(&at_tier, &self.config.audio_container)
    }

    fn audio_tier(stream: &StreamDescriptor) -> Option<AudioTier> {
        stream
            .audio_tier
            .or_else(|| stream.bitrate.map(AudioTier::from_bitrate))
    }

    fn prefer_container<'a>(
        candidates: &[&'a StreamDescriptor],
        container: &str,
    ) -> Option<&'a StreamDescriptor> {
        candidates
            .iter()
            .find(|s| s.container_is(container))
            .or_else(|| candidates.first())
            .copied()
    }

    /// One entry per label, preferred container winning over first seen,
    /// ordered by height then frame rate, both descending
    pub fn quality_list(
        streams: &[StreamDescriptor],
        role: StreamRole,
        preferred_container: &str,
    ) -> Vec<StreamOption> {
        let mut picked: Vec<&StreamDescriptor> = Vec::new();

        for stream in Self::playable(streams, role) {
            let Some(label) = stream.resolution.as_deref() else {
                continue;
            };

            match picked
                .iter()
                .position(|p| p.resolution.as_deref() == Some(label))
            {
                None => picked.push(stream),
                Some(idx) => {
                    if !picked[idx].container_is(preferred_container)
                        && stream.container_is(preferred_container)
                    {
                        picked[idx] = stream;
                    }
                }
            }
        }

        picked.sort_by_key(|s| Reverse((s.height().unwrap_or(0), s.fps())));

        picked
            .into_iter()
            .map(|s| StreamOption {
                url: s.url.trim().to_string(),
                resolution: s.resolution.clone().unwrap_or_default(),
                container: s.container.clone().unwrap_or_default(),
            })
            .collect()
    }
}
