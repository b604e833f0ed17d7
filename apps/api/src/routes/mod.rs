pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // multipart batches carry many files, well above axum's 2 MB default
    let body_limit = DefaultBodyLimit::max(state.config.max_batch_size);

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/evaluations",
            post(handlers::handle_evaluate).get(handlers::handle_list_evaluations),
        )
        .layer(body_limit)
        .with_state(state)
}
