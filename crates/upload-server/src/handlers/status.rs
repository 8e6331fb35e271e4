use axum::Json;
use axum::extract::{Path, State};
use chunkyard_protocol::UploadStatusResponse;

use crate::error::ServerError;
use crate::state::AppState;

/// GET /upload-status/{id}: chunk indices already held for `id`.
///
/// Unknown ids are not an error; they report an empty list.
pub async fn upload_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UploadStatusResponse>, ServerError> {
    let status = tokio::task::spawn_blocking(move || state.service().status(&id)).await?;
    Ok(Json(status))
}
