mod api;
mod cleanup;
mod config;
mod cookies;
mod error;
mod ytdlp;

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use api::AppState;
use config::{AuthMode, Settings};
use ytdlp::YtDlp;

// ============= Main =============

#[tokio::main]
async fn main() {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();

    // Ensure work directory exists
    if let Err(e) = std::fs::create_dir_all(&settings.temp_dir) {
        warn!("Could not create {:?}: {e}", settings.temp_dir);
    }

    info!("Starting server on port {}", settings.port);
    info!("Cookie file: {:?}", settings.cookies_path);
    info!("Work directory: {:?}", settings.temp_dir);
    info!("Auth mode: {}", settings.auth_mode.as_str());

    match settings.auth_mode {
        AuthMode::Cookies if !settings.cookies_path.exists() => {
            warn!("⚠️ Cookie file missing, video requests will fail until it is deployed");
        }
        AuthMode::Login if settings.credentials.is_none() => {
            warn!("⚠️ YT_USERNAME/YT_PASSWORD not set, video requests will fail");
        }
        _ => {}
    }

    match tokio::task::spawn_blocking(YtDlp::version).await {
        Ok(Ok(version)) => info!("✅ yt-dlp {version}"),
        Ok(Err(e)) => warn!("⚠️ {e}"),
        Err(e) => warn!("⚠️ yt-dlp version check failed: {e}"),
    }

    // Start cleanup scheduler
    cleanup::spawn_cleanup_task(settings.temp_dir.clone());

    let state = AppState {
        settings: settings.clone(),
        extractor: Arc::new(YtDlp),
    };

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers(Any);

    let app = api::router(state).layer(cors);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("🚀 ytstream-rs listening on {addr}");
    info!("   Extraction: yt-dlp via PyO3");

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
