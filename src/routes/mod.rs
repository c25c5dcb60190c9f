pub mod admin;
pub mod analytics;
pub mod auth;
pub mod media;
pub mod posts;
pub mod social;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::uploads::public_prefix;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(posts::router())
        .merge(analytics::router())
        .merge(media::router())
        .merge(social::router())
        .merge(admin::router());

    let uploads_prefix = public_prefix(&state.config.storage.public_prefix);
    let uploads = ServeDir::new(state.config.uploads_path());
    // Multipart framing needs a little room above the file itself
    let body_limit = state.config.storage.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .nest_service(&uploads_prefix, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
