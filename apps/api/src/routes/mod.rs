pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::check::handlers as check;
use crate::standards::handlers as standards;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        // Administrator configuration
        .route(
            "/api/v1/standards",
            get(standards::handle_get_standards).put(standards::handle_put_standards),
        )
        // Model upload and checking
        .route("/api/v1/inspect", post(check::handle_inspect))
        .route("/api/v1/check", post(check::handle_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
