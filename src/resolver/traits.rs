// Upstream provider trait and endpoint identity

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::errors::ProviderError;
use super::raw::{RawPlaylist, RawSearchHit, RawVideo};

/// Upstream flavour an endpoint speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Public instance API (`/api/v1/...`)
    #[default]
    Invidious,
    /// Privacy mirror API (`/streams/...`)
    Piped,
    /// Local extraction binary; the address is its path
    #[serde(alias = "yt-dlp")]
    YtDlp,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invidious => write!(f, "invidious"),
            Self::Piped => write!(f, "piped"),
            Self::YtDlp => write!(f, "ytdlp"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invidious" => Ok(Self::Invidious),
            "piped" => Ok(Self::Piped),
            "ytdlp" | "yt-dlp" | "yt_dlp" => Ok(Self::YtDlp),
            other => Err(format!("unknown provider kind: {}", other)),
        }
    }
}

/// Address plus kind; the only identity a provider has
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub address: String,
    pub kind: ProviderKind,
}

impl ProviderEndpoint {
    pub fn new(address: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            address: address.into(),
            kind,
        }
    }
}

impl fmt::Display for ProviderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.kind)
    }
}

/// Trait for upstream video-metadata providers
///
/// Only `fetch_video` and `probe` are mandatory. Providers without search or
/// playlist support keep the defaults, which report `Unsupported` and make
/// the pipeline move on to the next candidate.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn endpoint(&self) -> &ProviderEndpoint;

    /// Look up one video by id
    async fn fetch_video(&self, id: &str, timeout: Duration) -> Result<RawVideo, ProviderError>;

    /// Search video hits by free text
    async fn search(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<RawSearchHit>, ProviderError> {
        let _ = (query, timeout);
        Err(ProviderError::Unsupported("search"))
    }

    /// Look up a playlist and its entries
    async fn fetch_playlist(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<RawPlaylist, ProviderError> {
        let _ = (id, timeout);
        Err(ProviderError::Unsupported("playlist lookup"))
    }

    /// Cheap liveness call
    async fn probe(&self, timeout: Duration) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Invidious".parse::<ProviderKind>(), Ok(ProviderKind::Invidious));
        assert_eq!("yt-dlp".parse::<ProviderKind>(), Ok(ProviderKind::YtDlp));
        assert!("vimeo".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(serde_json::to_string(&ProviderKind::YtDlp).unwrap(), "\"ytdlp\"");
        let kind: ProviderKind = serde_json::from_str("\"yt-dlp\"").unwrap();
        assert_eq!(kind, ProviderKind::YtDlp);
    }
}
