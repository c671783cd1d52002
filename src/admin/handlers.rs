use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::PublicUser,
        extractors::AuthUser,
        guard::{require_capability, Capability},
        repo_types::User,
    },
    error::AppError,
    extract::ApiPath,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/verify/:user_id", put(verify_user))
}

#[instrument(skip(state, identity))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    require_capability(&state.db, &identity, Capability::ListUsers).await?;
    let users = User::list_all(&state.db).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, identity))]
pub async fn verify_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<Json<PublicUser>, AppError> {
    let admin = require_capability(&state.db, &identity, Capability::VerifyUsers).await?;
    let user = User::set_verified(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    info!(admin_id = admin.id, user_id = user.id, "user verified");
    Ok(Json(user.into()))
}
