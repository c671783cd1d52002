use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::repo::{self, CommentView};
use crate::{
    auth::extractors::AuthUser,
    error::{is_foreign_key_violation, AppError},
    extract::{ApiJson, ApiPath},
    resources::repo as resources_repo,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct NewCommentRequest {
    pub content: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/resources/:id/comments",
        get(list_comments).post(add_comment),
    )
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<CommentView>>, AppError> {
    if !resources_repo::exists(&state.db, id).await? {
        return Err(AppError::NotFound("Resource"));
    }
    Ok(Json(repo::list_for_resource(&state.db, id).await?))
}

#[instrument(skip(state, identity, body))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<NewCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), AppError> {
    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Comment content is required".into()));
    }

    let comment = repo::insert(&state.db, id, identity.id, content)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("Resource")
            } else {
                AppError::from(e)
            }
        })?;

    info!(comment_id = comment.id, resource_id = id, user_id = identity.id, "comment added");
    Ok((StatusCode::CREATED, Json(comment)))
}
