pub mod auth;
pub mod images;
pub mod middleware;
pub mod state;
pub mod style_guides;
pub mod transcriptions;
pub mod usage;

pub use state::AppState;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        // Session
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Transcriptions
        .route("/api/transcribe", post(transcriptions::transcribe))
        .route("/api/transcriptions", get(transcriptions::list))
        .route(
            "/api/transcriptions/:id",
            get(transcriptions::get)
                .put(transcriptions::update)
                .delete(transcriptions::delete),
        )
        .route(
            "/api/transcriptions/:id/process",
            post(transcriptions::process),
        )
        .route(
            "/api/transcriptions/:id/audio",
            get(transcriptions::get_audio).delete(transcriptions::delete_audio),
        )
        // Style guides
        .route(
            "/api/settings/style-guides",
            get(style_guides::list).post(style_guides::create),
        )
        .route(
            "/api/settings/style-guides/:id",
            get(style_guides::get)
                .put(style_guides::update)
                .delete(style_guides::delete),
        )
        .route(
            "/api/settings/style-guides/:id/generate",
            post(style_guides::generate),
        )
        .route(
            "/api/settings/style-guides/:id/default",
            put(style_guides::set_default),
        )
        // Image generation
        .route("/api/images/generate", post(images::generate))
        .route("/api/images", get(images::list))
        .route("/api/images/:id", get(images::get).delete(images::delete))
        .route("/api/images/:id/data", get(images::get_data))
        .route(
            "/api/images/transcription/:id",
            get(images::list_by_transcription),
        )
        // Usage
        .route("/api/usage", get(usage::list))
        .route("/api/usage/summary", get(usage::summary))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        // Health check
        .route("/api/health", get(health))
        // Authentication endpoints
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(600)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
