// Resolution pipeline - provider selection and fallback
//
// Strategy:
// 1. Validate input (no provider is contacted on bad input)
// 2. Refresh the pool once if it is empty
// 3. Walk one shuffled pick order strictly in sequence
// 4. Stop at the first usable answer, record every attempt

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::errors::{AttemptOutcome, AttemptRecord, ProviderError, ResolveError};
use super::format_selector::{FormatSelector, SelectionConfig};
use super::models::{NormalizedVideoResult, PlaylistResult, SearchResultItem, VideoSummary};
use super::pool::ProviderPool;
use super::raw::{RawPlaylist, RawSearchHit, RawVideo};
use super::traits::{ProviderEndpoint, VideoProvider};
use super::utils::{is_valid_playlist_id, is_valid_video_id};

/// Pipeline timing and selection settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Budget of one upstream call
    pub lookup_timeout: Duration,
    /// Wall-clock budget of one request across all candidates
    pub deadline: Duration,
    pub probe_timeout: Duration,
    /// Probe each candidate before the lookup and skip unreachable ones
    pub probe_before_lookup: bool,
    pub selection: SelectionConfig,
    /// Upper bound on returned search hits
    pub search_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_millis(3000),
            deadline: Duration::from_millis(10_000),
            probe_timeout: Duration::from_millis(1500),
            probe_before_lookup: false,
            selection: SelectionConfig::default(),
            search_limit: 20,
        }
    }
}

impl ResolverConfig {
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_probe_before_lookup(mut self, enabled: bool) -> Self {
        self.probe_before_lookup = enabled;
        self
    }

    pub fn with_selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }
}

/// A successful resolution and how it was reached
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    /// Provider that produced `value`
    pub provider: ProviderEndpoint,
    /// Every attempt in order, the last one being the success
    pub attempts: Vec<AttemptRecord>,
}

pub struct ResolutionPipeline {
    pool: Arc<ProviderPool>,
    config: ResolverConfig,
    selector: FormatSelector,
}

impl ResolutionPipeline {
    pub fn new(pool: Arc<ProviderPool>, config: ResolverConfig) -> Self {
        let selector = FormatSelector::new(config.selection.clone());
        Self {
            pool,
            config,
            selector,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<ProviderPool> {
        &self.pool
    }

    /// Resolve a video id into normalized stream URLs
    pub async fn resolve_by_id(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<Resolved<NormalizedVideoResult>, ResolveError> {
        if !is_valid_video_id(id) {
            return Err(ResolveError::validation(format!(
                "video id must be 11 characters of [A-Za-z0-9_-], got {:?}",
                id
            )));
        }

        let video_id = id.to_string();
        let resolved = self
            .run_candidates(
                "video lookup",
                deadline,
                |provider, timeout| {
                    let video_id = video_id.clone();
                    async move { provider.fetch_video(&video_id, timeout).await }
                },
                |raw: &RawVideo| {
                    if raw.has_playable_stream() {
                        Ok(())
                    } else {
                        Err("response has no playable stream".to_string())
                    }
                },
            )
            .await?;

        let value = self.selector.normalize(id, &resolved.value);
        Ok(Resolved {
            value,
            provider: resolved.provider,
            attempts: resolved.attempts,
        })
    }

    /// Free-text search; an empty hit list is a valid answer
    pub async fn search(
        &self,
        query: &str,
        deadline: Duration,
    ) -> Result<Resolved<Vec<SearchResultItem>>, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::validation("search query is empty"));
        }

        let owned_query = query.to_string();
        let resolved = self
            .run_candidates(
                "search",
                deadline,
                |provider, timeout| {
                    let query = owned_query.clone();
                    async move { provider.search(&query, timeout).await }
                },
                |_: &Vec<RawSearchHit>| Ok(()),
            )
            .await?;

        let items: Vec<SearchResultItem> = resolved
            .value
            .into_iter()
            .filter_map(SearchResultItem::from_hit)
            .take(self.config.search_limit.max(1))
            .collect();

        Ok(Resolved {
            value: items,
            provider: resolved.provider,
            attempts: resolved.attempts,
        })
    }

    /// Descriptive summary of a video without streams
    pub async fn video_summary(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<Resolved<VideoSummary>, ResolveError> {
        if !is_valid_video_id(id) {
            return Err(ResolveError::validation(format!(
                "video id must be 11 characters of [A-Za-z0-9_-], got {:?}",
                id
            )));
        }

        let video_id = id.to_string();
        let resolved = self
            .run_candidates(
                "video summary",
                deadline,
                |provider, timeout| {
                    let video_id = video_id.clone();
                    async move { provider.fetch_video(&video_id, timeout).await }
                },
                |raw: &RawVideo| {
                    if raw.metadata().title.is_some() {
                        Ok(())
                    } else {
                        Err("response has no title".to_string())
                    }
                },
            )
            .await?;

        Ok(Resolved {
            value: VideoSummary::from_metadata(id, resolved.value.metadata()),
            provider: resolved.provider,
            attempts: resolved.attempts,
        })
    }

    /// Playlist title and entries
    pub async fn playlist(
        &self,
        id: &str,
        deadline: Duration,
    ) -> Result<Resolved<PlaylistResult>, ResolveError> {
        if !is_valid_playlist_id(id) {
            return Err(ResolveError::validation(format!(
                "playlist id must be 10-64 characters of [A-Za-z0-9_-], got {:?}",
                id
            )));
        }

        let playlist_id = id.to_string();
        let resolved = self
            .run_candidates(
                "playlist lookup",
                deadline,
                |provider, timeout| {
                    let playlist_id = playlist_id.clone();
                    async move { provider.fetch_playlist(&playlist_id, timeout).await }
                },
                |raw: &RawPlaylist| {
                    if raw.title.is_none() && raw.entries.is_empty() {
                        Err("response has neither title nor entries".to_string())
                    } else {
                        Ok(())
                    }
                },
            )
            .await?;

        Ok(Resolved {
            value: PlaylistResult::from_raw(id, resolved.value),
            provider: resolved.provider,
            attempts: resolved.attempts,
        })
    }

    /// Snapshot order for one request, refreshing an empty pool once
    async fn candidates(&self) -> Result<Vec<Arc<dyn VideoProvider>>, ResolveError> {
        if self.pool.is_empty().await {
            tracing::info!("provider pool is empty, refreshing");
            self.pool.refresh().await;
        }

        let order = self.pool.pick_order().await;
        if order.is_empty() {
            let cause = self.pool.last_error().await;
            tracing::error!(cause = ?cause, "no providers available");
            return Err(ResolveError::PoolUnavailable(cause));
        }
        Ok(order)
    }

    /// Sequential fallback over one pick order
    ///
    /// `call` performs the upstream request, `accept` decides whether a
    /// successful answer carries enough data; a rejected answer is a soft
    /// failure and the loop moves on.
    async fn run_candidates<T, F, Fut, A>(
        &self,
        operation: &'static str,
        deadline: Duration,
        call: F,
        accept: A,
    ) -> Result<Resolved<T>, ResolveError>
    where
        F: Fn(Arc<dyn VideoProvider>, Duration) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
        A: Fn(&T) -> Result<(), String>,
    {
        let started = Instant::now();
        let order = self.candidates().await?;
        let total = order.len();
        let mut attempts: Vec<AttemptRecord> = Vec::with_capacity(total);

        for (index, provider) in order.into_iter().enumerate() {
            let endpoint = provider.endpoint().clone();

            let Some(remaining) = deadline.checked_sub(started.elapsed()).filter(|r| !r.is_zero())
            else {
                return Err(Self::deadline_exceeded(operation, deadline, attempts));
            };

            let attempt_started = Instant::now();

            if self.config.probe_before_lookup {
                let probe_budget = self.config.probe_timeout.min(remaining);
                if !ProviderPool::probe(provider.as_ref(), probe_budget).await {
                    tracing::warn!(provider = %endpoint, "{} skipped, probe failed", operation);
                    attempts.push(Self::record(
                        &endpoint,
                        AttemptOutcome::NetworkFailure("liveness probe failed".to_string()),
                        attempt_started,
                    ));
                    continue;
                }
            }

            let Some(remaining) = deadline.checked_sub(started.elapsed()).filter(|r| !r.is_zero())
            else {
                return Err(Self::deadline_exceeded(operation, deadline, attempts));
            };
            let budget = self.config.lookup_timeout.min(remaining);

            tracing::debug!(
                provider = %endpoint,
                attempt = index + 1,
                of = total,
                budget_ms = budget.as_millis() as u64,
                "trying {}",
                operation
            );

            let outcome = match tokio::time::timeout(budget, call(provider.clone(), budget)).await
            {
                Err(_) => Err(AttemptOutcome::NetworkFailure(
                    ProviderError::Timeout(budget.as_millis() as u64).to_string(),
                )),
                Ok(Err(e)) if e.is_soft() => Err(AttemptOutcome::SoftFailure(e.to_string())),
                Ok(Err(e)) => Err(AttemptOutcome::NetworkFailure(e.to_string())),
                Ok(Ok(value)) => match accept(&value) {
                    Ok(()) => Ok(value),
                    Err(reason) => Err(AttemptOutcome::SoftFailure(reason)),
                },
            };

            match outcome {
                Ok(value) => {
                    let record = Self::record(&endpoint, AttemptOutcome::Success, attempt_started);
                    tracing::info!(
                        provider = %endpoint,
                        elapsed_ms = record.elapsed_ms,
                        failed_before = attempts.len(),
                        "{} succeeded",
                        operation
                    );
                    attempts.push(record);
                    return Ok(Resolved {
                        value,
                        provider: endpoint,
                        attempts,
                    });
                }
                Err(failure) => {
                    let record = Self::record(&endpoint, failure, attempt_started);
                    tracing::warn!(attempt = %record, "{} failed, trying next provider", operation);
                    attempts.push(record);
                }
            }
        }

        // The last lookup may have been clamped to what was left of the budget
        if started.elapsed() >= deadline {
            return Err(Self::deadline_exceeded(operation, deadline, attempts));
        }

        tracing::error!(attempts = attempts.len(), "{} exhausted every provider", operation);
        Err(ResolveError::Exhausted { attempts })
    }

    fn record(endpoint: &ProviderEndpoint, outcome: AttemptOutcome, since: Instant) -> AttemptRecord {
        AttemptRecord {
            provider: endpoint.address.clone(),
            kind: endpoint.kind,
            outcome,
            elapsed_ms: since.elapsed().as_millis() as u64,
        }
    }

    fn deadline_exceeded(
        operation: &'static str,
        deadline: Duration,
        attempts: Vec<AttemptRecord>,
    ) -> ResolveError {
        tracing::error!(
            deadline_ms = deadline.as_millis() as u64,
            attempts = attempts.len(),
            "{} ran out of time",
            operation
        );
        ResolveError::DeadlineExceeded {
            deadline_ms: deadline.as_millis() as u64,
            attempts,
        }
    }
}
