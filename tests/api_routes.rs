//! Router tests through `tower::ServiceExt::oneshot`

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use video_relay_lib::api::{create_router, AppState};
use video_relay_lib::resolver::raw::RawSearchHit;
use video_relay_lib::resolver::{
    ProviderEndpoint, ProviderError, ProviderKind, ProviderPool, RawVideo, ResolutionPipeline,
    ResolverConfig, VideoProvider,
};

struct FixtureProvider {
    endpoint: ProviderEndpoint,
    healthy: bool,
}

#[async_trait]
impl VideoProvider for FixtureProvider {
    fn endpoint(&self) -> &ProviderEndpoint {
        &self.endpoint
    }

    async fn fetch_video(&self, _id: &str, _timeout: Duration) -> Result<RawVideo, ProviderError> {
        if !self.healthy {
            return Err(ProviderError::Status(502));
        }
        let video = serde_json::from_value(json!({
            "title": "Fixture",
            "author": "Fixture Channel",
            "authorId": "UCfixture",
            "viewCount": 7,
            "lengthSeconds": 61,
            "formatStreams": [
                {"url": "https://f.example/18", "container": "mp4", "resolution": "360p", "quality": "medium"}
            ],
            "adaptiveFormats": [
                {"url": "https://f.example/248", "type": "video/webm", "container": "webm", "resolution": "1080p"},
                {"url": "https://f.example/140", "type": "audio/mp4", "container": "m4a",
                 "audioQuality": "AUDIO_QUALITY_MEDIUM"}
            ]
        }))
        .unwrap();
        Ok(RawVideo::Invidious(video))
    }

    async fn search(
        &self,
        _query: &str,
        _timeout: Duration,
    ) -> Result<Vec<RawSearchHit>, ProviderError> {
        if !self.healthy {
            return Err(ProviderError::Status(502));
        }
        Ok(vec![RawSearchHit {
            id: Some("dQw4w9WgXcQ".into()),
            title: Some("test".into()),
            length_seconds: Some(125),
            ..Default::default()
        }])
    }

    async fn probe(&self, _timeout: Duration) -> Result<(), ProviderError> {
        Ok(())
    }
}

fn make_app(providers: Vec<(&str, bool)>) -> Router {
    let providers: Vec<Arc<dyn VideoProvider>> = providers
        .into_iter()
        .map(|(address, healthy)| {
            Arc::new(FixtureProvider {
                endpoint: ProviderEndpoint::new(address, ProviderKind::Invidious),
                healthy,
            }) as Arc<dyn VideoProvider>
        })
        .collect();
    let pool = Arc::new(ProviderPool::from_providers(providers));
    let pipeline = ResolutionPipeline::new(pool, ResolverConfig::default());
    create_router(AppState::new(pipeline))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_liveness() {
    let app = make_app(vec![]);
    let (status, _) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_video_route() {
    let app = make_app(vec![("https://down.example", false), ("https://up.example", true)]);

    for uri in ["/api/dQw4w9WgXcQ", "/api/login/dQw4w9WgXcQ"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body["videoId"], "dQw4w9WgXcQ");
        assert_eq!(body["combinedStreamUrl"], "https://f.example/18");
        assert_eq!(body["highResVideoOnlyUrl"], "https://f.example/248");
        assert_eq!(body["audioOnlyUrl"], "https://f.example/140");
        assert_eq!(body["viewCount"], 7);
        assert!(body["likeCount"].is_null());
        assert_eq!(body["authorThumbnail"], "");
    }
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let app = make_app(vec![("https://up.example", true)]);

    let (status, body) = get(&app, "/api/short").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_exhausted_is_server_error_with_details() {
    let app = make_app(vec![("https://a.example", false), ("https://b.example", false)]);

    let (status, body) = get(&app, "/api/dQw4w9WgXcQ").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("https://a.example"));
    assert!(details.contains("https://b.example"));

    let attempts = body["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    let mut providers: Vec<&str> = attempts
        .iter()
        .map(|a| a["provider"].as_str().unwrap())
        .collect();
    providers.sort_unstable();
    assert_eq!(providers, vec!["https://a.example", "https://b.example"]);
    for attempt in attempts {
        assert_eq!(attempt["kind"], "invidious");
        assert_eq!(attempt["outcome"], "network_failure");
        assert_eq!(attempt["reason"], "upstream returned HTTP 502");
        assert!(attempt["elapsedMs"].is_u64());
    }
}

#[tokio::test]
async fn test_empty_pool_is_server_error() {
    let app = make_app(vec![]);

    let (status, body) = get(&app, "/api/dQw4w9WgXcQ").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (status, _) = get(&app, "/data").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = get(&app, "/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_search_route() {
    let app = make_app(vec![("https://up.example", true)]);

    let (status, body) = get(&app, "/api/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body.get("details").is_none());

    let (status, _) = get(&app, "/api/search?q=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/api/search?q=test").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["durationFormatted"], "2:05");
    assert_eq!(body[0]["author"], "Unknown");
    assert_eq!(body[0]["url"], "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
}

#[tokio::test]
async fn test_video_info_and_playlist_routes() {
    let app = make_app(vec![("https://up.example", true)]);

    let (status, body) = get(&app, "/api/video_info?id=dQw4w9WgXcQ").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Fixture");
    assert_eq!(body["uploader"], "Fixture Channel");
    assert_eq!(body["duration"], 61);

    let (status, _) = get(&app, "/api/video_info").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Fixture providers keep the default playlist behaviour
    let (status, body) = get(&app, "/api/playlist_info?id=PLBCF2DAC6FFB574DE").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].as_str().unwrap().contains("not supported"));
}

#[tokio::test]
async fn test_pool_routes() {
    let app = make_app(vec![("https://a.example", true), ("https://b.example", true)]);

    let (status, body) = get(&app, "/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "static");
    assert_eq!(body["providers"].as_array().unwrap().len(), 2);
    assert_eq!(body["providers"][0]["kind"], "invidious");

    let (status, _) = get(&app, "/refresh").await;
    assert_eq!(status, StatusCode::OK);
}
