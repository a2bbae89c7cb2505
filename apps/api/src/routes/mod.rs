pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::cv::handlers;
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // CV pipeline
        .route("/api/v1/cv/extract", post(handlers::handle_extract))
        .route("/api/v1/cv/parse", post(handlers::handle_parse))
        .route("/api/v1/cv/parse/live", post(handlers::handle_parse_live))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
