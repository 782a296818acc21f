use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{AuthMode, Settings};
use crate::cookies;
use crate::error::ApiError;
use crate::ytdlp::{self, ExtractOptions, Extractor};

pub const WELCOME: &str =
    "Welcome to the yt-dlp streaming URL API server. Use GET /api/videos/<videoid>";

// ============= Application State =============

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub extractor: Arc<dyn Extractor>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/api/videos/{video_id}", get(video_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

// ============= Response Models =============

#[derive(Serialize)]
struct StreamResponse {
    message: &'static str,
    video_id: String,
    url: String,
    note: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    version: &'static str,
    runtime: &'static str,
    auth_mode: &'static str,
    cookies_present: bool,
    credentials_configured: bool,
}

// ============= Handlers =============

/// GET / — Plaintext banner
async fn home_handler() -> &'static str {
    WELCOME
}

/// GET /api/videos/{video_id} — Resolve a direct streaming URL
async fn video_handler(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Response {
    let wording = Wording::for_mode(state.settings.auth_mode);

    match resolve_stream_url(&state, &video_id, &wording).await {
        Ok(url) => {
            info!("Resolved stream for ID {video_id}");
            let body = StreamResponse {
                message: wording.message,
                video_id,
                url,
                note: wording.success_note,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            match &e {
                ApiError::Extraction { .. } => error!("yt-dlp error for ID {video_id}: {e}"),
                _ => error!("Request for ID {video_id} failed: {e}"),
            }
            e.into_response()
        }
    }
}

/// GET /health — Health check endpoint
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let settings = &state.settings;
    let cookies_present = tokio::fs::try_exists(&settings.cookies_path)
        .await
        .unwrap_or(false);

    let body = HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        runtime: "Rust + Tokio + PyO3 (yt-dlp)",
        auth_mode: settings.auth_mode.as_str(),
        cookies_present,
        credentials_configured: settings.credentials.is_some(),
    };
    (StatusCode::OK, Json(body))
}

/// 404 handler
async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Route not found"})),
    )
}

// ============= Core Logic =============

struct Wording {
    message: &'static str,
    success_note: &'static str,
    failure_note: &'static str,
}

impl Wording {
    fn for_mode(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Cookies => Self {
                message: "Successfully extracted streaming URL using yt-dlp and cookies.",
                success_note: "Extracted with session/preference data from cookies.",
                failure_note: "Ensure the video is accessible with the provided cookies.",
            },
            AuthMode::Login => Self {
                message: "Successfully extracted streaming URL using yt-dlp with account login.",
                success_note: "Extracted with an authenticated session for the configured account.",
                failure_note: "Ensure the video is accessible with the configured account.",
            },
        }
    }
}

/// Check credentials, prepare a private cookie copy, run yt-dlp, pick a URL.
async fn resolve_stream_url(
    state: &AppState,
    video_id: &str,
    wording: &Wording,
) -> Result<String, ApiError> {
    let settings = &state.settings;

    let credentials = match settings.auth_mode {
        AuthMode::Cookies => {
            let exists = tokio::fs::try_exists(&settings.cookies_path)
                .await
                .unwrap_or(false);
            if !exists {
                return Err(ApiError::Configuration {
                    error: "Configuration Error: cookies.txt file not found.",
                    details: "Ensure cookies.txt is deployed alongside the server (COOKIES_PATH).",
                });
            }
            None
        }
        AuthMode::Login => match settings.credentials {
            Some(ref creds) => Some(creds.clone()),
            None => {
                return Err(ApiError::Configuration {
                    error: "Configuration Error: YT_USERNAME and YT_PASSWORD must be set.",
                    details: "Set both YT_USERNAME and YT_PASSWORD in the environment.",
                })
            }
        },
    };

    let origin_exists = tokio::fs::try_exists(&settings.cookies_path)
        .await
        .unwrap_or(false);
    let cookie_copy = if origin_exists || credentials.is_none() {
        let copy = cookies::copy_to_workdir(&settings.cookies_path, &settings.temp_dir).await?;
        Some(copy)
    } else {
        warn!(
            "Cookie file {} not found, logging in with credentials only",
            settings.cookies_path.display()
        );
        None
    };

    let options = ExtractOptions {
        cookie_file: cookie_copy.as_ref().map(|c| c.path().to_path_buf()),
        sleep_interval_requests: credentials
            .as_ref()
            .map(|_| settings.sleep_interval_requests),
        credentials,
    };

    let url = ytdlp::watch_url(video_id);
    info!("Extracting {url}");

    let extractor = state.extractor.clone();
    let info = tokio::task::spawn_blocking(move || {
        let result = extractor.extract(&url, &options);
        // The copy must outlive the extractor even if the request is dropped
        drop(cookie_copy);
        result
    })
    .await
    .map_err(|e| ApiError::Unexpected(format!("Extraction task failed: {e}")))?
    .map_err(|e| ApiError::from_extract(e, wording.failure_note))?;

    ytdlp::select_stream_url(&info).map_err(|e| ApiError::from_extract(e, wording.failure_note))
}
