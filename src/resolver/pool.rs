// Provider pool - the process-wide set of upstream endpoints
//
// The pool holds an immutable snapshot behind a lock. Readers clone the
// `Arc`, `refresh()` builds a new list and swaps it in whole.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::errors::ProviderError;
use super::providers::ProviderFactory;
use super::traits::{ProviderEndpoint, ProviderKind, VideoProvider};
use super::utils::get_json;

/// Public instance directory used when nothing else is configured
pub const DEFAULT_DIRECTORY_URL: &str = "https://wtserver.glitch.me/apis";

/// Source of provider endpoints
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// Human-readable location, shown in the pool status
    fn location(&self) -> String;

    async fn fetch(&self) -> Result<Vec<ProviderEndpoint>, ProviderError>;
}

/// Directory served as JSON over HTTP
pub struct HttpDirectory {
    url: String,
    client: reqwest::Client,
    default_kind: ProviderKind,
    timeout: Duration,
}

impl HttpDirectory {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            default_kind: ProviderKind::default(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_default_kind(mut self, kind: ProviderKind) -> Self {
        self.default_kind = kind;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ProviderDirectory for HttpDirectory {
    fn location(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<ProviderEndpoint>, ProviderError> {
        let document: Value = get_json(&self.client, &self.url, &[], self.timeout).await?;
        parse_directory(&document, self.default_kind)
    }
}

/// Read a directory document into endpoints
///
/// Accepted entry shapes:
/// - `"https://host"` (default kind)
/// - `{"url" | "address" | "uri": "...", "kind" | "type": "..."}`
/// - `["name", {"uri": "...", "type": "..."}]`
///
/// Entries of any other shape are kept as their JSON text and fail when
/// called. The document itself may be a list or an object wrapping one
/// under `providers`, `instances` or `apis`.
pub fn parse_directory(
    document: &Value,
    default_kind: ProviderKind,
) -> Result<Vec<ProviderEndpoint>, ProviderError> {
    let entries = match document {
        Value::Array(items) => items,
        Value::Object(map) => ["providers", "instances", "apis"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| ProviderError::Parse("directory has no provider list".to_string()))?,
        _ => {
            return Err(ProviderError::Parse(
                "directory is not a JSON list".to_string(),
            ))
        }
    };

    Ok(entries
        .iter()
        .map(|entry| parse_entry(entry, default_kind))
        .collect())
}

fn parse_entry(entry: &Value, default_kind: ProviderKind) -> ProviderEndpoint {
    let parsed = match entry {
        Value::String(address) => Some(ProviderEndpoint::new(address.trim(), default_kind)),
        Value::Object(_) => endpoint_from_object(entry, default_kind),
        Value::Array(pair) => pair
            .iter()
            .find(|v| v.is_object())
            .and_then(|obj| endpoint_from_object(obj, default_kind)),
        _ => None,
    };

    parsed.unwrap_or_else(|| ProviderEndpoint::new(entry.to_string(), default_kind))
}

fn endpoint_from_object(obj: &Value, default_kind: ProviderKind) -> Option<ProviderEndpoint> {
    let address = ["url", "address", "uri"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))?;

    // Unknown kinds ("https", "onion") fall back to the default
    let kind = ["kind", "type"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .and_then(|k| k.parse().ok())
        .unwrap_or(default_kind);

    Some(ProviderEndpoint::new(address.trim(), kind))
}

enum PoolSource {
    Static,
    Directory {
        directory: Arc<dyn ProviderDirectory>,
        factory: Arc<dyn ProviderFactory>,
    },
}

struct PoolState {
    providers: Arc<Vec<Arc<dyn VideoProvider>>>,
    last_error: Option<String>,
}

/// Snapshot of the pool for `/data`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub source: String,
    pub providers: Vec<ProviderEndpoint>,
    pub last_error: Option<String>,
}

/// Process-wide provider pool
pub struct ProviderPool {
    source: PoolSource,
    state: RwLock<PoolState>,
}

impl ProviderPool {
    /// Fixed list of ready providers; `refresh()` keeps it as is
    pub fn from_providers(providers: Vec<Arc<dyn VideoProvider>>) -> Self {
        Self {
            source: PoolSource::Static,
            state: RwLock::new(PoolState {
                providers: Arc::new(providers),
                last_error: None,
            }),
        }
    }

    /// Fixed list of endpoints built through `factory`
    pub fn with_static(endpoints: Vec<ProviderEndpoint>, factory: &dyn ProviderFactory) -> Self {
        Self::from_providers(endpoints.into_iter().map(|e| factory.build(e)).collect())
    }

    /// Pool filled from a directory; empty until the first `refresh()`
    pub fn with_directory(
        directory: Arc<dyn ProviderDirectory>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            source: PoolSource::Directory { directory, factory },
            state: RwLock::new(PoolState {
                providers: Arc::new(Vec::new()),
                last_error: None,
            }),
        }
    }

    /// Re-read the directory and swap the snapshot
    ///
    /// A failed fetch keeps the previous snapshot and is only recorded in
    /// `last_error`. Returns the provider count afterwards.
    pub async fn refresh(&self) -> usize {
        let PoolSource::Directory { directory, factory } = &self.source else {
            return self.providers().await.len();
        };

        match directory.fetch().await {
            Ok(endpoints) => {
                let providers: Vec<Arc<dyn VideoProvider>> =
                    endpoints.into_iter().map(|e| factory.build(e)).collect();
                let count = providers.len();

                let mut state = self.state.write().await;
                state.providers = Arc::new(providers);
                state.last_error = None;

                tracing::info!(count, directory = %directory.location(), "provider pool refreshed");
                count
            }
            Err(e) => {
                let mut state = self.state.write().await;
                state.last_error = Some(e.to_string());

                tracing::warn!(
                    error = %e,
                    directory = %directory.location(),
                    kept = state.providers.len(),
                    "provider directory fetch failed"
                );
                state.providers.len()
            }
        }
    }

    /// Current snapshot
    pub async fn providers(&self) -> Arc<Vec<Arc<dyn VideoProvider>>> {
        self.state.read().await.providers.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.providers.is_empty()
    }

    /// Fresh random permutation of the current snapshot
    pub async fn pick_order(&self) -> Vec<Arc<dyn VideoProvider>> {
        let mut order: Vec<Arc<dyn VideoProvider>> = self.providers().await.iter().cloned().collect();
        let mut rng = rand::thread_rng();
        order.shuffle(&mut rng);
        order
    }

    /// Bounded liveness check
    pub async fn probe(provider: &dyn VideoProvider, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, provider.probe(timeout)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(provider = %provider.endpoint(), error = %e, "probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(provider = %provider.endpoint(), "probe timed out");
                false
            }
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn status(&self) -> PoolStatus {
        let state = self.state.read().await;
        PoolStatus {
            source: match &self.source {
                PoolSource::Static => "static".to_string(),
                PoolSource::Directory { directory, .. } => directory.location(),
            },
            providers: state
                .providers
                .iter()
                .map(|p| p.endpoint().clone())
                .collect(),
            last_error: state.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::raw::RawVideo;
    use serde_json::json;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    struct StubProvider {
        endpoint: ProviderEndpoint,
        probe_delay: Duration,
    }

    #[async_trait]
    impl VideoProvider for StubProvider {
        fn endpoint(&self) -> &ProviderEndpoint {
            &self.endpoint
        }

        async fn fetch_video(&self, _id: &str, _timeout: Duration) -> Result<RawVideo, ProviderError> {
            Err(ProviderError::Status(500))
        }

        async fn probe(&self, _timeout: Duration) -> Result<(), ProviderError> {
            tokio::time::sleep(self.probe_delay).await;
            Ok(())
        }
    }

    struct StubFactory;

    impl ProviderFactory for StubFactory {
        fn build(&self, endpoint: ProviderEndpoint) -> Arc<dyn VideoProvider> {
            Arc::new(StubProvider {
                endpoint,
                probe_delay: Duration::ZERO,
            })
        }
    }

    struct ScriptedDirectory {
        answers: Mutex<VecDeque<Result<Vec<ProviderEndpoint>, ProviderError>>>,
    }

    impl ScriptedDirectory {
        fn new(answers: Vec<Result<Vec<ProviderEndpoint>, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
            })
        }
    }

    #[async_trait]
    impl ProviderDirectory for ScriptedDirectory {
        fn location(&self) -> String {
            "scripted".to_string()
        }

        async fn fetch(&self) -> Result<Vec<ProviderEndpoint>, ProviderError> {
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Status(503)))
        }
    }

    fn make_endpoints(n: usize) -> Vec<ProviderEndpoint> {
        (0..n)
            .map(|i| ProviderEndpoint::new(format!("https://p{}.example", i), ProviderKind::Invidious))
            .collect()
    }

    #[test]
    fn test_parse_directory_shapes() {
        let doc = json!([
            "https://a.example/",
            {"url": "https://b.example", "kind": "piped"},
            {"address": "/usr/bin/yt-dlp", "kind": "yt-dlp"},
            ["c.example", {"uri": "https://c.example", "type": "https"}],
            42
        ]);

        let endpoints = parse_directory(&doc, ProviderKind::Invidious).unwrap();
        assert_eq!(endpoints.len(), 5);
        assert_eq!(endpoints[0], ProviderEndpoint::new("https://a.example/", ProviderKind::Invidious));
        assert_eq!(endpoints[1].kind, ProviderKind::Piped);
        assert_eq!(endpoints[2].kind, ProviderKind::YtDlp);
        assert_eq!(endpoints[3], ProviderEndpoint::new("https://c.example", ProviderKind::Invidious));
        // Garbage is kept and fails at call time
        assert_eq!(endpoints[4].address, "42");
    }

    #[test]
    fn test_parse_directory_wrapped_and_invalid() {
        let wrapped = json!({"instances": ["https://a.example"]});
        assert_eq!(parse_directory(&wrapped, ProviderKind::Piped).unwrap()[0].kind, ProviderKind::Piped);

        assert!(parse_directory(&json!("nope"), ProviderKind::Invidious).is_err());
        assert!(parse_directory(&json!({"other": 1}), ProviderKind::Invidious).is_err());
    }

    #[tokio::test]
    async fn test_refresh_swaps_snapshot() {
        let directory = ScriptedDirectory::new(vec![Ok(make_endpoints(2)), Ok(make_endpoints(3))]);
        let pool = ProviderPool::with_directory(directory, Arc::new(StubFactory));

        assert!(pool.is_empty().await);
        let before = pool.providers().await;

        assert_eq!(pool.refresh().await, 2);
        assert_eq!(pool.refresh().await, 3);

        // Earlier snapshots stay intact for readers holding them
        assert!(before.is_empty());
        assert_eq!(pool.providers().await.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let directory = ScriptedDirectory::new(vec![
            Ok(make_endpoints(2)),
            Err(ProviderError::Status(502)),
        ]);
        let pool = ProviderPool::with_directory(directory, Arc::new(StubFactory));

        pool.refresh().await;
        assert_eq!(pool.refresh().await, 2);
        assert_eq!(pool.providers().await.len(), 2);
        assert!(pool.last_error().await.unwrap().contains("502"));
    }

    #[tokio::test]
    async fn test_failed_first_refresh_stays_empty() {
        let directory = ScriptedDirectory::new(vec![Err(ProviderError::Parse("bad".into()))]);
        let pool = ProviderPool::with_directory(directory, Arc::new(StubFactory));

        assert_eq!(pool.refresh().await, 0);
        assert!(pool.is_empty().await);
        let status = pool.status().await;
        assert_eq!(status.source, "scripted");
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_static_refresh_is_noop() {
        let pool = ProviderPool::with_static(make_endpoints(3), &StubFactory);
        assert_eq!(pool.refresh().await, 3);
        assert_eq!(pool.status().await.source, "static");
    }

    #[tokio::test]
    async fn test_pick_order_is_permutation() {
        let pool = ProviderPool::with_static(make_endpoints(8), &StubFactory);

        for _ in 0..5 {
            let order = pool.pick_order().await;
            let addresses: HashSet<String> =
                order.iter().map(|p| p.endpoint().address.clone()).collect();
            assert_eq!(order.len(), 8);
            assert_eq!(addresses.len(), 8);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_respects_timeout() {
        let fast = StubProvider {
            endpoint: ProviderEndpoint::new("https://fast.example", ProviderKind::Invidious),
            probe_delay: Duration::from_millis(100),
        };
        let slow = StubProvider {
            endpoint: ProviderEndpoint::new("https://slow.example", ProviderKind::Invidious),
            probe_delay: Duration::from_secs(10),
        };

        assert!(ProviderPool::probe(&fast, Duration::from_millis(500)).await);
        assert!(!ProviderPool::probe(&slow, Duration::from_millis(500)).await);
    }
}
