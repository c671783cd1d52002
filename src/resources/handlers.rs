use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};

use super::dto::{AddTagsRequest, DeletedResponse, UpdateResourceRequest};
use super::repo_types::ResourceView;
use super::services::{self, split_tag_field, NewResource, UploadItem};
use crate::{
    auth::extractors::{AuthUser, MaybeUser},
    error::AppError,
    extract::{ApiJson, ApiPath},
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/resources", get(list_resources))
        .route("/resources/:id", get(get_resource))
}

pub fn write_routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/resources", post(create_resource_multipart))
        .route("/resources/:id", put(update_resource).delete(delete_resource))
        .route("/resources/:id/tags", post(add_tags))
        .layer(DefaultBodyLimit::max(upload_max_bytes))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_resources(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResourceView>>, AppError> {
    Ok(Json(services::list_resources(&state).await?))
}

#[instrument(skip(state))]
pub async fn get_resource(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ResourceView>, AppError> {
    Ok(Json(services::get_resource(&state, id).await?))
}

/// POST /resources (multipart)
/// Fields: title, description, subject, tags (repeatable or comma-separated), file
#[instrument(skip(state, identity, mp))]
pub async fn create_resource_multipart(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    mut mp: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<ResourceView>), AppError> {
    let mut new = NewResource::default();
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().map(|s| s.to_string());
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(bad_multipart)?;
                // browsers send an empty part when no file was picked
                if body.is_empty() && file_name.as_deref().unwrap_or("").is_empty() {
                    continue;
                }
                new.file = Some(UploadItem {
                    body,
                    content_type,
                    file_name,
                });
            }
            Some("title") => new.title = field.text().await.map_err(bad_multipart)?,
            Some("description") => {
                new.description = Some(field.text().await.map_err(bad_multipart)?)
            }
            Some("subject") => new.subject = Some(field.text().await.map_err(bad_multipart)?),
            Some("tags") | Some("tags[]") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                new.tags.extend(split_tag_field(&raw).map(str::to_string));
            }
            _ => {}
        }
    }

    let created = services::create_resource(&state, identity.as_ref(), new).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        HeaderValue::from_str(&format!("/resources/{}", created.id)).map_err(anyhow::Error::from)?,
    );
    Ok((StatusCode::CREATED, headers, Json(created)))
}

#[instrument(skip(state, identity, body))]
pub async fn update_resource(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateResourceRequest>,
) -> Result<Json<ResourceView>, AppError> {
    let updated = services::update_resource(
        &state,
        identity.as_ref(),
        id,
        &body.title,
        body.description.as_deref(),
        body.subject.as_deref(),
    )
    .await?;
    Ok(Json(updated))
}

#[instrument(skip(state, identity, body))]
pub async fn add_tags(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<AddTagsRequest>,
) -> Result<Json<ResourceView>, AppError> {
    Ok(Json(
        services::add_tags(&state, identity.as_ref(), id, &body.tags).await?,
    ))
}

#[instrument(skip(state, identity))]
pub async fn delete_resource(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    services::delete_resource(&state, &identity, id).await?;
    Ok(Json(DeletedResponse {
        message: "Resource deleted",
    }))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    warn!(error = %e, "malformed multipart body");
    AppError::Validation(format!("Invalid upload: {e}"))
}
