pub mod status;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use chunkyard_protocol::constants::{ROUTE_HEALTH, ROUTE_UPLOAD, ROUTE_UPLOAD_STATUS};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Room for multipart boundaries and metadata fields on top of the chunk.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config()
        .max_chunk_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(ROUTE_HEALTH, get(health))
        .route(ROUTE_UPLOAD, post(upload::upload_chunk))
        .route(ROUTE_UPLOAD_STATUS, get(status::upload_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}
