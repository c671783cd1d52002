use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::repo;
use crate::{
    auth::extractors::AuthUser,
    error::{is_foreign_key_violation, AppError},
    extract::ApiPath,
    resources::repo as resources_repo,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct UpvoteResponse {
    pub upvotes: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/resources/:id/rate", post(upvote))
}

/// POST /resources/:id/rate → { "upvotes": n }, n = distinct voters.
#[instrument(skip(state, identity))]
pub async fn upvote(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<UpvoteResponse>, AppError> {
    if !resources_repo::exists(&state.db, id).await? {
        return Err(AppError::NotFound("Resource"));
    }
    repo::upsert_upvote(&state.db, id, identity.id)
        .await
        .map_err(|e| {
            // resource deleted between the check and the insert
            if is_foreign_key_violation(&e) {
                AppError::NotFound("Resource")
            } else {
                AppError::from(e)
            }
        })?;
    let upvotes = repo::count_upvotes(&state.db, id).await?;
    info!(resource_id = id, user_id = identity.id, upvotes, "upvote recorded");
    Ok(Json(UpvoteResponse { upvotes }))
}
