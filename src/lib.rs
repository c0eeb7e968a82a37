pub mod api;
pub mod config;
pub mod resolver;

use std::sync::Arc;

use api::{create_router, AppState};
use config::AppConfig;
use resolver::utils::build_http_client;
use resolver::{
    DefaultProviderFactory, HttpDirectory, ProviderPool, ResolutionPipeline,
};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Build the pool and pipeline described by `config`
pub fn build_state(config: &AppConfig) -> Result<AppState, ServerError> {
    let client = build_http_client(&config.http)?;
    let factory = Arc::new(
        DefaultProviderFactory::new(client.clone())
            .with_proxy(config.http.proxy.clone())
            .with_search_limit(config.resolver.search_limit),
    );

    let pool = match (&config.pool.directory_url, config.pool.uses_directory()) {
        (Some(url), true) => {
            let directory = HttpDirectory::new(url.clone(), client)
                .with_default_kind(config.pool.default_kind);
            ProviderPool::with_directory(Arc::new(directory), factory)
        }
        _ => ProviderPool::with_static(config.pool.static_providers.clone(), factory.as_ref()),
    };

    let pipeline = ResolutionPipeline::new(Arc::new(pool), config.resolver.clone());
    Ok(AppState::new(pipeline))
}

/// Serve until Ctrl-C
pub async fn run_server(config: AppConfig) -> Result<(), ServerError> {
    let state = build_state(&config)?;

    // First directory fetch runs in the background; requests that arrive
    // before it finishes refresh on their own
    let pool = state.pool.clone();
    tokio::spawn(async move {
        pool.refresh().await;
    });

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;

    tracing::info!(addr = %config.bind_addr, "video relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
    }
    tracing::info!("shutting down");
}
