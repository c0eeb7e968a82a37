// HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::resolver::{AttemptRecord, ResolveError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or blank query parameter
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Pool has nothing to show or could not be refreshed
    #[error("provider list is unavailable")]
    PoolUnavailable(Option<String>),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    /// Per-provider outcomes of a failed resolution
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attempts: Vec<AttemptRecord>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::Resolve(ResolveError::Validation(_)) => (
                StatusCode::BAD_REQUEST,
                "invalid request".to_string(),
                Some(self.details()),
            ),
            ApiError::Resolve(e) => {
                tracing::error!(error = %e, details = %e.details(), "resolution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.to_string(),
                    Some(e.details()),
                )
            }
            ApiError::PoolUnavailable(cause) => {
                tracing::error!(cause = ?cause, "provider list unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    self.to_string(),
                    Some(
                        cause
                            .clone()
                            .unwrap_or_else(|| "provider list is empty".to_string()),
                    ),
                )
            }
        };

        let attempts = match &self {
            ApiError::Resolve(e) => e.attempts().to_vec(),
            _ => Vec::new(),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                details,
                attempts,
            }),
        )
            .into_response()
    }
}

impl ApiError {
    fn details(&self) -> String {
        match self {
            ApiError::Resolve(e) => e.details(),
            other => other.to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{AttemptOutcome, ProviderKind};
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_deadline_lists_attempts() {
        let error = ResolveError::DeadlineExceeded {
            deadline_ms: 4000,
            attempts: vec![
                AttemptRecord {
                    provider: "https://a.example".into(),
                    kind: ProviderKind::Piped,
                    outcome: AttemptOutcome::NetworkFailure("timed out after 3000 ms".into()),
                    elapsed_ms: 3000,
                },
                AttemptRecord {
                    provider: "https://b.example".into(),
                    kind: ProviderKind::Invidious,
                    outcome: AttemptOutcome::SoftFailure("response has no playable stream".into()),
                    elapsed_ms: 40,
                },
            ],
        };

        let (status, body) = body_json(error.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["attempts"][0]["provider"], "https://a.example");
        assert_eq!(body["attempts"][0]["kind"], "piped");
        assert_eq!(body["attempts"][0]["outcome"], "network_failure");
        assert_eq!(body["attempts"][0]["elapsedMs"], 3000);
        assert_eq!(body["attempts"][1]["outcome"], "soft_failure");
        assert_eq!(body["attempts"][1]["reason"], "response has no playable stream");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (status, body) = body_json(ApiError::BadRequest("q is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "q is required");
        assert!(body.get("details").is_none());

        let (status, body) =
            body_json(ResolveError::validation("video id must be 11 characters").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"].as_str().unwrap().contains("11 characters"));

        let (status, body) = body_json(ResolveError::Exhausted { attempts: vec![] }.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].is_string());
        assert!(body.get("attempts").is_none());

        let (status, _) = body_json(ResolveError::PoolUnavailable(None).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
