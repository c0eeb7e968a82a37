// Provider adapters - one per upstream kind

pub mod invidious;
pub mod piped;
pub mod ytdlp;

use std::sync::Arc;

pub use invidious::InvidiousProvider;
pub use piped::PipedProvider;
pub use ytdlp::YtDlpProvider;

use super::traits::{ProviderEndpoint, ProviderKind, VideoProvider};

/// Turns pool entries into callable providers
pub trait ProviderFactory: Send + Sync {
    fn build(&self, endpoint: ProviderEndpoint) -> Arc<dyn VideoProvider>;
}

/// Factory for the built-in adapters, sharing one HTTP client
pub struct DefaultProviderFactory {
    client: reqwest::Client,
    proxy: Option<String>,
    search_limit: usize,
}

impl DefaultProviderFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            proxy: None,
            search_limit: 20,
        }
    }

    /// Proxy handed to the extraction binary; HTTP providers get it via the client
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn build(&self, endpoint: ProviderEndpoint) -> Arc<dyn VideoProvider> {
        match endpoint.kind {
            ProviderKind::Invidious => Arc::new(InvidiousProvider::new(endpoint, self.client.clone())),
            ProviderKind::Piped => Arc::new(PipedProvider::new(endpoint, self.client.clone())),
            ProviderKind::YtDlp => Arc::new(
                YtDlpProvider::new(endpoint)
                    .with_proxy(self.proxy.clone())
                    .with_search_limit(self.search_limit),
            ),
        }
    }
}
