//! API router configuration

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::{health, video};
use crate::state::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes();

    Router::new()
        .route("/image-to-video", post(video::image_to_video))
        .route("/health", get(health::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
