pub mod dto;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::log_requests;
pub use rest::ApiDoc;
pub use state::AppState;

/// Builds the API routes. CORS and Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(rest::health_handler))
        .route(
            "/api/source-content",
            post(rest::create_source_content_handler).get(rest::list_source_contents_handler),
        )
        .route(
            "/api/source-content/{id}",
            get(rest::get_source_content_handler),
        )
        .route(
            "/api/source-content/{id}/concepts",
            get(rest::list_concepts_handler),
        )
        .route(
            "/api/source-content/{id}/quizzes",
            get(rest::list_quizzes_handler),
        )
        .route(
            "/api/source-content/{id}/content",
            get(rest::list_generated_content_handler),
        )
        .layer(axum_middleware::from_fn(log_requests))
        .with_state(app_state)
}
