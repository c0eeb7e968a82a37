// HTTP surface

pub mod error;
pub mod handlers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::resolver::{ProviderPool, ResolutionPipeline};

pub use error::{ApiError, ApiResult};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ProviderPool>,
    pub pipeline: Arc<ResolutionPipeline>,
}

impl AppState {
    pub fn new(pipeline: ResolutionPipeline) -> Self {
        Self {
            pool: pipeline.pool().clone(),
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/data", get(handlers::pool_data))
        .route("/refresh", get(handlers::refresh_pool))
        // Fixed paths are matched before `{id}`
        .route("/api/search", get(handlers::search))
        .route("/api/video_info", get(handlers::video_info))
        .route("/api/playlist_info", get(handlers::playlist_info))
        .route("/api/login/{id}", get(handlers::resolve_video))
        .route("/api/{id}", get(handlers::resolve_video))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
