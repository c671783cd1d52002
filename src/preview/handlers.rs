use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    error::AppError, extract::ApiPath, resources::repo as resources_repo, state::AppState,
    storage,
};

/// Characters returned by a preview.
pub const PREVIEW_CHARS: usize = 200;
// a UTF-8 char is at most four bytes
const PREVIEW_BYTES: usize = PREVIEW_CHARS * 4;

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub preview: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/resources/:id/preview", get(preview))
}

pub async fn preview_text(state: &AppState, id: i64) -> Result<String, AppError> {
    let resource = resources_repo::get_row(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("Resource"))?;
    let key = resource
        .file_path
        .as_deref()
        .and_then(storage::key_from_public_path)
        .ok_or(AppError::NotFound("File"))?;

    let prefix = state
        .storage
        .read_prefix(key, PREVIEW_BYTES)
        .await?
        .ok_or(AppError::NotFound("File"))?;

    let extractor = state.extractors.for_key(key);
    debug!(resource_id = id, extractor = extractor.name(), bytes = prefix.len(), "building preview");
    Ok(extractor.extract(&prefix, PREVIEW_CHARS)?)
}

#[instrument(skip(state))]
pub async fn preview(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PreviewResponse>, AppError> {
    Ok(Json(PreviewResponse {
        preview: preview_text(&state, id).await?,
    }))
}
