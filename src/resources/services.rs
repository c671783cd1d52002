use std::collections::BTreeSet;

use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};

use super::repo;
use super::repo_types::ResourceView;
use crate::{
    auth::{extractors::Identity, guard::ensure_owner},
    config::EditPolicy,
    error::AppError,
    state::AppState,
    storage,
};

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

#[derive(Default)]
pub struct NewResource {
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub tags: Vec<String>,
    pub file: Option<UploadItem>,
}

/// Trims, drops empty names and duplicates. Sorted so the set compares stably.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A single `tags` form field may carry several comma-separated names.
pub fn split_tag_field(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn required_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    Ok(title.to_string())
}

/// Edits are open to anyone unless the policy restricts them to the owner.
pub fn ensure_can_edit(
    policy: EditPolicy,
    identity: Option<&Identity>,
    owner_id: Option<i64>,
) -> Result<(), AppError> {
    match policy {
        EditPolicy::Open => Ok(()),
        EditPolicy::Owner => {
            let identity = identity.ok_or(AppError::Unauthenticated)?;
            ensure_owner(identity, owner_id)
        }
    }
}

pub async fn list_resources(st: &AppState) -> Result<Vec<ResourceView>, AppError> {
    let mut rows = repo::list_views(&st.db).await?;
    for r in &mut rows {
        r.tags = normalize_tags(&r.tags);
    }
    Ok(rows)
}

pub async fn get_resource(st: &AppState, id: i64) -> Result<ResourceView, AppError> {
    let mut view = repo::get_view(&st.db, id)
        .await?
        .ok_or(AppError::NotFound("Resource"))?;
    view.tags = normalize_tags(&view.tags);
    Ok(view)
}

/// Stores the file first, then writes the row and its tags in one transaction.
/// If the transaction fails the stored file is removed again.
pub async fn create_resource(
    st: &AppState,
    owner: Option<&Identity>,
    new: NewResource,
) -> Result<ResourceView, AppError> {
    let NewResource {
        title,
        description,
        subject,
        tags,
        file,
    } = new;
    let title = required_title(&title)?;
    let tags = normalize_tags(&tags);

    let stored_key = match file {
        Some(file) => {
            let key = storage::object_key(file.file_name.as_deref());
            st.storage
                .put_object(&key, file.body, &file.content_type)
                .await
                .with_context(|| format!("store upload {key}"))?;
            Some(key)
        }
        None => None,
    };
    let file_path = stored_key.as_deref().map(storage::public_path);

    let written = async {
        let mut tx = st.db.begin().await.context("begin tx")?;
        let row = repo::insert_tx(
            &mut tx,
            &title,
            description.as_deref(),
            subject.as_deref(),
            owner.map(|o| o.id),
            file_path.as_deref(),
        )
        .await?;
        repo::link_tags_tx(&mut tx, row.id, &tags).await?;
        tx.commit().await.context("commit tx")?;
        anyhow::Ok(row)
    }
    .await;

    let row = match written {
        Ok(row) => row,
        Err(e) => {
            if let Some(key) = &stored_key {
                if let Err(cleanup) = st.storage.delete_object(key).await {
                    warn!(error = %cleanup, key, "failed to remove orphaned upload");
                }
            }
            return Err(e.into());
        }
    };

    info!(resource_id = row.id, owner = ?row.user_id, tags = tags.len(), "resource created");
    get_resource(st, row.id).await
}

pub async fn update_resource(
    st: &AppState,
    identity: Option<&Identity>,
    id: i64,
    title: &str,
    description: Option<&str>,
    subject: Option<&str>,
) -> Result<ResourceView, AppError> {
    let title = required_title(title)?;
    let current = repo::get_row(&st.db, id)
        .await?
        .ok_or(AppError::NotFound("Resource"))?;
    ensure_can_edit(st.config.edit_policy, identity, current.user_id)?;

    if !repo::update_fields(&st.db, id, &title, description, subject).await? {
        return Err(AppError::NotFound("Resource"));
    }
    get_resource(st, id).await
}

pub async fn add_tags(
    st: &AppState,
    identity: Option<&Identity>,
    id: i64,
    tags: &[String],
) -> Result<ResourceView, AppError> {
    let current = repo::get_row(&st.db, id)
        .await?
        .ok_or(AppError::NotFound("Resource"))?;
    ensure_can_edit(st.config.edit_policy, identity, current.user_id)?;

    let tags = normalize_tags(tags);
    if !tags.is_empty() {
        let mut tx = st.db.begin().await.context("begin tx")?;
        repo::link_tags_tx(&mut tx, id, &tags).await?;
        tx.commit().await.context("commit tx")?;
    }
    get_resource(st, id).await
}

pub async fn delete_resource(st: &AppState, identity: &Identity, id: i64) -> Result<(), AppError> {
    let current = repo::get_row(&st.db, id)
        .await?
        .ok_or(AppError::NotFound("Resource"))?;
    if let Err(e) = ensure_owner(identity, current.user_id) {
        warn!(resource_id = id, user_id = identity.id, "delete by non-owner");
        return Err(e);
    }

    // deleted concurrently between the check and here
    let Some(file_path) = repo::delete_owned(&st.db, id, identity.id).await? else {
        return Err(AppError::NotFound("Resource"));
    };

    if let Some(key) = file_path.as_deref().and_then(storage::key_from_public_path) {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, key, "failed to remove stored file");
        }
    }
    info!(resource_id = id, user_id = identity.id, "resource deleted");
    Ok(())
}
