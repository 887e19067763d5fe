//! Failure screenshot serving.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;

use crate::api::state::AppState;

// GET /api/screenshots/{filename}
pub async fn serve_screenshot(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    // Only the basename is honored; traversal components are stripped.
    let basename = std::path::Path::new(&filename)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    if basename.is_empty() {
        return (StatusCode::NOT_FOUND, "Screenshot not found").into_response();
    }

    let path = state.config.screenshot_dir.join(&basename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "public, max-age=3600"),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Screenshot not found").into_response(),
    }
}
