pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::tailor::handlers;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/sections", post(handlers::handle_scan_sections))
        .route(
            "/api/v1/tailor",
            post(handlers::handle_tailor).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}
