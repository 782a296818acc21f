use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::ytdlp::ExtractError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{error} ({details})")]
    Configuration {
        error: &'static str,
        details: &'static str,
    },

    #[error("File System Error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("{message}")]
    Extraction {
        message: String,
        note: &'static str,
    },

    #[error("{0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn from_extract(err: ExtractError, note: &'static str) -> Self {
        match err {
            ExtractError::Extraction(message) => ApiError::Extraction { message, note },
            ExtractError::Unexpected(message) => ApiError::Unexpected(message),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Extraction { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Configuration { error, details } => serde_json::json!({
                "error": error,
                "details": details,
            }),
            ApiError::FileSystem(e) => serde_json::json!({
                "error": "File System Error: could not prepare a writable cookie file.",
                "details": e.to_string(),
            }),
            // Only the first line; yt-dlp appends verbose diagnostics below it
            ApiError::Extraction { message, note } => serde_json::json!({
                "error": "Failed to extract streaming URL.",
                "details": message.lines().next().unwrap_or_default(),
                "note": note,
            }),
            ApiError::Unexpected(message) => serde_json::json!({
                "error": "An unexpected server error occurred.",
                "details": message,
            }),
        };
        (status, Json(body)).into_response()
    }
}
