//! HTTP surface for the moodboard pipeline.
//!
//! Three operations: create a moodboard from a mood description, persist one
//! under a share slug, and fetch a shared board. A failed creation returns
//! 502 together with the static fallback board so the client can keep its
//! page populated while offering a retry.

use crate::moodboard::{MoodDescription, MoodboardResult, SharedMoodboard};
use crate::orchestrator::{MoodboardManager, OrchestrationError};
use crate::share_store::{share_url, MoodboardStore};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<MoodboardManager>,
    pub store: Arc<dyn MoodboardStore>,
    pub base_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/moodboard", post(create_moodboard))
        .route("/api/board", post(share_board))
        .route("/api/board/{id}", get(get_board))
        .with_state(state)
}

pub async fn run_server(
    state: AppState,
    port: u16,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on port {}", port);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CreateMoodboardRequest {
    mood: String,
}

#[derive(Debug, Serialize)]
struct ShareResponse {
    id: String,
    url: String,
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "providers": state.manager.provider_status(),
    }))
}

async fn create_moodboard(
    State(state): State<AppState>,
    Json(request): Json<CreateMoodboardRequest>,
) -> Result<Json<MoodboardResult>, ApiError> {
    let mood = MoodDescription::new(&request.mood)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let board = state
        .manager
        .create_moodboard(mood)
        .await
        .map_err(ApiError::Upstream)?;
    Ok(Json(board))
}

async fn share_board(
    State(state): State<AppState>,
    Json(board): Json<MoodboardResult>,
) -> Result<(StatusCode, Json<ShareResponse>), ApiError> {
    let id = state.store.save(&board).map_err(ApiError::Internal)?;
    let url = share_url(&state.base_url, &id);
    info!(id = %id, "Moodboard shared");
    Ok((StatusCode::CREATED, Json(ShareResponse { id, url })))
}

async fn get_board(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SharedMoodboard>, ApiError> {
    match state.store.get(&id).map_err(ApiError::Internal)? {
        Some(shared) => Ok(Json(shared)),
        None => Err(ApiError::NotFound),
    }
}

enum ApiError {
    BadRequest(String),
    NotFound,
    /// Moodboard creation failed upstream; the body carries the static
    /// fallback board alongside the error so clients can stay populated.
    Upstream(OrchestrationError),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "moodboard not found" })),
            )
                .into_response(),
            ApiError::Upstream(e) => {
                error!(error = %e, "Moodboard creation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({
                        "error": e.to_string(),
                        "fallback": MoodboardResult::fallback(),
                    })),
                )
                    .into_response()
            }
            ApiError::Internal(e) => {
                error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moodboard::{CompletionResult, Track, TrackCandidate};
    use crate::providers::{
        ImageGenerator, MalformedResponse, MoodAnalyzer, ProviderError, TrackCatalog,
    };
    use crate::share_store::SqliteMoodboardStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct FakeAnalyzer {
        succeed: bool,
    }

    #[async_trait]
    impl MoodAnalyzer for FakeAnalyzer {
        fn is_configured(&self) -> bool {
            self.succeed
        }

        async fn analyze(
            &self,
            _mood: &MoodDescription,
        ) -> Result<CompletionResult, ProviderError> {
            if !self.succeed {
                return Err(ProviderError::Unconfigured);
            }
            Ok(CompletionResult {
                poetic_caption: "A caption.".to_string(),
                catalog_query: "warm folk".to_string(),
                image_prompt: "amber haze".to_string(),
                suggested_tracks: vec![TrackCandidate {
                    name: "Holocene".to_string(),
                    artist: "Bon Iver".to_string(),
                    album: None,
                    duration: None,
                }],
            })
        }
    }

    struct FakeCatalog;

    #[async_trait]
    impl TrackCatalog for FakeCatalog {
        fn is_configured(&self) -> bool {
            false
        }

        async fn resolve(
            &self,
            _candidates: &[TrackCandidate],
        ) -> Result<Vec<Track>, ProviderError> {
            Err(ProviderError::Unconfigured)
        }

        async fn search_tracks(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<Track>, ProviderError> {
            Err(ProviderError::Unconfigured)
        }
    }

    struct FakeImages;

    #[async_trait]
    impl ImageGenerator for FakeImages {
        fn is_configured(&self) -> bool {
            false
        }

        async fn generate(
            &self,
            _prompt: &str,
            _count: usize,
        ) -> Result<Vec<String>, ProviderError> {
            Err(ProviderError::Malformed(MalformedResponse::MissingContent))
        }
    }

    fn test_router(analyzer_succeeds: bool) -> (Router, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteMoodboardStore::new(tmp.path().join("moodboards.db")).unwrap();
        let manager = MoodboardManager::new(
            Arc::new(FakeAnalyzer {
                succeed: analyzer_succeeds,
            }),
            Arc::new(FakeCatalog),
            Arc::new(FakeImages),
        );
        let state = AppState {
            manager: Arc::new(manager),
            store: Arc::new(store),
            base_url: "http://localhost:3000".to_string(),
        };
        (router(state), tmp)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_provider_status() {
        let (router, _tmp) = test_router(true);
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["providers"]["completion"], true);
        assert_eq!(body["providers"]["catalog"], false);
    }

    #[tokio::test]
    async fn test_create_moodboard_success() {
        let (router, _tmp) = test_router(true);
        let response = router
            .oneshot(json_request(
                "POST",
                "/api/moodboard",
                json!({ "mood": "quietly electric" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["original_mood"], "quietly electric");
        assert_eq!(body["playlist"].as_array().unwrap().len(), 1);
        assert_eq!(body["images"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_create_moodboard_empty_mood_is_bad_request() {
        let (router, _tmp) = test_router(true);
        let response = router
            .oneshot(json_request("POST", "/api/moodboard", json!({ "mood": "" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_moodboard_upstream_failure_serves_fallback() {
        let (router, _tmp) = test_router(false);
        let response = router
            .oneshot(json_request(
                "POST",
                "/api/moodboard",
                json!({ "mood": "quietly electric" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("mood analysis"));
        assert_eq!(body["fallback"]["playlist"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_share_then_get_board() {
        let (router, _tmp) = test_router(true);

        let board = serde_json::to_value(MoodboardResult::fallback()).unwrap();
        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/board", board))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let shared = body_json(response).await;
        let id = shared["id"].as_str().unwrap().to_string();
        assert_eq!(
            shared["url"],
            format!("http://localhost:3000/board/{id}")
        );

        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/board/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], id.as_str());
        assert_eq!(body["view_count"], 1);
        assert_eq!(body["playlist"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_get_unknown_board_is_not_found() {
        let (router, _tmp) = test_router(true);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/board/dreamy-echo-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
