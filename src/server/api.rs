//! Route table and cross-cutting layers

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState, ServerConfig};

fn error_body(message: &str) -> Json<serde_json::Value> {
    Json(json!({ "error": true, "message": message }))
}

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        error_body("Not found. Check /api/health for API status."),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        error_body("Method not allowed for this route."),
    )
}

/// Assemble the application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    // Machine-local tool: allow all origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/data/upload", post(handlers::upload_data))
        .route("/data/preview", get(handlers::get_data_preview))
        .route("/train", post(handlers::start_training))
        .route("/quadrants", get(handlers::get_quadrants))
        .route(
            "/session",
            get(handlers::get_session).delete(handlers::reset_session),
        )
        .route("/health", get(handlers::health_check))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    Router::new()
        .nest("/api", api)
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
