use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};

use crate::state::AppState;

/// GET /preview -- hand over the most recent preview image.
///
/// The slot holds one image and a GET consumes it: polling again before
/// the next preview frame arrives returns 404 rather than the same
/// image twice.
pub async fn take_preview(State(state): State<AppState>) -> Response {
    match state.preview.lock().await.take() {
        Some(artifact) => {
            ([(header::CONTENT_TYPE, artifact.kind.mime())], artifact.bytes).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Mount preview routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/preview", get(take_preview))
}
