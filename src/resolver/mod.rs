// Resolver module - provider pool, adapters and the fallback pipeline

pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod pool;
pub mod providers;
pub mod raw;
pub mod traits;
pub mod utils;

pub use errors::{AttemptOutcome, AttemptRecord, ProviderError, ResolveError};
pub use format_selector::{FormatSelector, SelectionConfig};
pub use models::{
    NormalizedVideoResult, PlaylistResult, PlaylistVideo, SearchResultItem, StreamOption,
    Thumbnail, VideoSummary,
};
pub use orchestrator::{ResolutionPipeline, Resolved, ResolverConfig};
pub use pool::{HttpDirectory, PoolStatus, ProviderDirectory, ProviderPool, DEFAULT_DIRECTORY_URL};
pub use providers::{DefaultProviderFactory, ProviderFactory};
pub use raw::{AudioTier, RawVideo};
pub use traits::{ProviderEndpoint, ProviderKind, VideoProvider};
pub use utils::HttpConfig;
