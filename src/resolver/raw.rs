// Raw provider responses and the provider-neutral descriptors mapped from them
//
// Every provider answers in its own shape. Each shape is kept as a variant of
// `RawVideo` and is read through one defensive mapping per variant, so an
// absent or oddly-typed field becomes `None` instead of a failed request.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::providers::invidious::InvidiousVideo;
use super::providers::piped::PipedVideo;
use super::providers::ytdlp::YtDlpVideo;
use super::utils::is_absolute_url;

/// What a stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// Muxed video and audio
    Combined,
    VideoOnly,
    AudioOnly,
}

/// Coarse audio quality bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTier {
    Low,
    #[default]
    Medium,
    High,
}

impl AudioTier {
    /// Read a provider hint such as `AUDIO_QUALITY_MEDIUM` or `low`
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.to_ascii_lowercase();
        if hint.contains("low") {
            Some(Self::Low)
        } else if hint.contains("medium") {
            Some(Self::Medium)
        } else if hint.contains("high") {
            Some(Self::High)
        } else {
            None
        }
    }

    /// Bucket by bitrate in bits per second
    pub fn from_bitrate(bps: u64) -> Self {
        match bps / 1000 {
            0..=95 => Self::Low,
            96..=160 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// One stream as exposed by any provider
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub url: String,
    pub role: StreamRole,
    /// Quality label such as `1080p` or `720p60`
    pub resolution: Option<String>,
    /// Lowercase container (`webm`, `mp4`, `m4a`)
    pub container: Option<String>,
    /// Bits per second
    pub bitrate: Option<u64>,
    pub audio_tier: Option<AudioTier>,
    /// Provider marks this as its default combined quality
    pub is_default: bool,
}

impl StreamDescriptor {
    pub fn is_playable(&self) -> bool {
        is_absolute_url(&self.url)
    }

    pub fn height(&self) -> Option<u32> {
        self.resolution.as_deref().and_then(parse_label).map(|(h, _)| h)
    }

    pub fn fps(&self) -> u32 {
        self.resolution
            .as_deref()
            .and_then(parse_label)
            .map_or(0, |(_, fps)| fps)
    }

    pub fn container_is(&self, wanted: &str) -> bool {
        self.container
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(wanted))
    }
}

/// Split a quality label into (height, fps). `1080p60` -> (1080, 60)
pub fn parse_label(label: &str) -> Option<(u32, u32)> {
    lazy_static::lazy_static! {
        static ref LABEL_RE: Regex = Regex::new(r"^(\d{2,4})p(\d{2,3})?").unwrap();
    }

    let caps = LABEL_RE.captures(label.trim())?;
    let height = caps.get(1)?.as_str().parse().ok()?;
    let fps = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some((height, fps))
}

/// Map a MIME type to a container name
pub fn container_from_mime(mime: &str) -> Option<String> {
    let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, sub) = essence.split_once('/')?;
    let container = match (kind, sub) {
        ("audio", "mp4") => "m4a",
        (_, "mp4") => "mp4",
        (_, "webm") => "webm",
        (_, "3gpp") => "3gp",
        (_, other) => other,
    };
    Some(container.to_string())
}

/// Descriptive fields shared by every provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub author_id: Option<String>,
    pub author_thumbnail: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub description: Option<String>,
    pub duration_seconds: Option<u64>,
    pub thumbnail: Option<String>,
    /// `YYYYMMDD`
    pub upload_date: Option<String>,
}

/// A by-id lookup answer, one variant per provider kind
#[derive(Debug, Clone)]
pub enum RawVideo {
    Invidious(InvidiousVideo),
    Piped(PipedVideo),
    YtDlp(YtDlpVideo),
}

impl RawVideo {
    pub fn streams(&self) -> Vec<StreamDescriptor> {
        match self {
            Self::Invidious(v) => v.streams(),
            Self::Piped(v) => v.streams(),
            Self::YtDlp(v) => v.streams(),
        }
    }

    pub fn metadata(&self) -> VideoMetadata {
        match self {
            Self::Invidious(v) => v.metadata(),
            Self::Piped(v) => v.metadata(),
            Self::YtDlp(v) => v.metadata(),
        }
    }

    /// Minimum bar for a usable answer: one stream with an absolute URL
    pub fn has_playable_stream(&self) -> bool {
        self.streams().iter().any(StreamDescriptor::is_playable)
    }
}

/// Image reference attached to hits and playlist entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawThumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One search hit, already lifted out of the provider shape
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSearchHit {
    pub id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub view_count: Option<u64>,
    pub length_seconds: Option<u64>,
    pub thumbnails: Vec<RawThumbnail>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlaylistEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlaylist {
    pub id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub video_count: Option<u64>,
    pub entries: Vec<RawPlaylistEntry>,
}

// ============================================================================
// Lenient field readers
// ============================================================================

/// Accepts a number, a numeric string (commas allowed) or null
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_u64))
}

pub(crate) fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Accepts a string; anything else reads as absent
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

/// Reads a list, dropping elements that do not fit `T`; null reads as empty
pub(crate) fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("1080p"), Some((1080, 0)));
        assert_eq!(parse_label("720p60"), Some((720, 60)));
        assert_eq!(parse_label("144p"), Some((144, 0)));
        assert_eq!(parse_label("hd720"), None);
        assert_eq!(parse_label("128 kbps"), None);
    }

    #[test]
    fn test_container_from_mime() {
        assert_eq!(
            container_from_mime("audio/mp4; codecs=\"mp4a.40.2\"").as_deref(),
            Some("m4a")
        );
        assert_eq!(
            container_from_mime("video/webm; codecs=\"vp9\"").as_deref(),
            Some("webm")
        );
        assert_eq!(container_from_mime("video/mp4").as_deref(), Some("mp4"));
        assert_eq!(container_from_mime("garbage"), None);
    }

    #[test]
    fn test_audio_tier() {
        assert_eq!(AudioTier::from_hint("AUDIO_QUALITY_MEDIUM"), Some(AudioTier::Medium));
        assert_eq!(AudioTier::from_hint("AUDIO_QUALITY_LOW"), Some(AudioTier::Low));
        assert_eq!(AudioTier::from_hint("tiny"), None);
        assert_eq!(AudioTier::from_bitrate(48_000), AudioTier::Low);
        assert_eq!(AudioTier::from_bitrate(129_000), AudioTier::Medium);
        assert_eq!(AudioTier::from_bitrate(256_000), AudioTier::High);
    }

    #[test]
    fn test_lenient_readers() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "lenient_u64")]
            count: Option<u64>,
            #[serde(default, deserialize_with = "lenient_string")]
            name: Option<String>,
            #[serde(default, deserialize_with = "lenient_vec")]
            items: Vec<u32>,
        }

        let p: Probe =
            serde_json::from_str(r#"{"count": "1,234", "name": 5, "items": [1, "x", 3]}"#)
                .unwrap();
        assert_eq!(p.count, Some(1234));
        assert_eq!(p.name, None);
        assert_eq!(p.items, vec![1, 3]);

        let p: Probe = serde_json::from_str(r#"{"count": -1, "items": null}"#).unwrap();
        assert_eq!(p.count, None);
        assert!(p.items.is_empty());
    }
}
