use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};

use super::repo_types::{ResourceRow, ResourceView};

/// Resources outer-joined to owner, tags and ratings, one row per resource.
/// Placeholder tag artifacts of the outer join (NULL / empty names) are filtered out.
const AGGREGATE_SELECT: &str = r#"
    SELECT r.id, r.title, r.description, r.subject, r.user_id, r.file_path, r.created_at,
           u.username,
           COALESCE(u.verified, FALSE) AS verified,
           COALESCE(
               ARRAY_AGG(DISTINCT t.name) FILTER (WHERE t.name IS NOT NULL AND t.name <> ''),
               ARRAY[]::TEXT[]
           ) AS tags,
           COUNT(DISTINCT rr.user_id) AS upvotes
      FROM resources r
      LEFT JOIN users u             ON u.id = r.user_id
      LEFT JOIN resource_tags rt    ON rt.resource_id = r.id
      LEFT JOIN tags t              ON t.id = rt.tag_id
      LEFT JOIN resource_ratings rr ON rr.resource_id = r.id
"#;

const AGGREGATE_GROUP: &str = "GROUP BY r.id, u.username, u.verified";

pub async fn list_views(db: &PgPool) -> anyhow::Result<Vec<ResourceView>> {
    let rows = sqlx::query_as::<_, ResourceView>(&format!(
        "{AGGREGATE_SELECT} {AGGREGATE_GROUP} ORDER BY r.id"
    ))
    .fetch_all(db)
    .await
    .context("list resources")?;
    Ok(rows)
}

pub async fn get_view(db: &PgPool, id: i64) -> anyhow::Result<Option<ResourceView>> {
    let row = sqlx::query_as::<_, ResourceView>(&format!(
        "{AGGREGATE_SELECT} WHERE r.id = $1 {AGGREGATE_GROUP}"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get resource")?;
    Ok(row)
}

pub async fn get_row(db: &PgPool, id: i64) -> anyhow::Result<Option<ResourceRow>> {
    let row = sqlx::query_as::<_, ResourceRow>(
        r#"
        SELECT id, title, description, subject, user_id, file_path, created_at
          FROM resources
         WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get resource row")?;
    Ok(row)
}

pub async fn exists(db: &PgPool, id: i64) -> anyhow::Result<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM resources WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await
        .context("resource exists")?;
    Ok(found)
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    title: &str,
    description: Option<&str>,
    subject: Option<&str>,
    user_id: Option<i64>,
    file_path: Option<&str>,
) -> anyhow::Result<ResourceRow> {
    let row = sqlx::query_as::<_, ResourceRow>(
        r#"
        INSERT INTO resources (title, description, subject, user_id, file_path)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, title, description, subject, user_id, file_path, created_at
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(subject)
    .bind(user_id) // Option<i64> → NULL for anonymous uploads
    .bind(file_path)
    .fetch_one(&mut **tx)
    .await
    .context("insert resource")?;
    Ok(row)
}

/// Creates missing tags and links all of them to the resource. Re-linking is a no-op.
pub async fn link_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    resource_id: i64,
    tags: &[String],
) -> anyhow::Result<()> {
    for name in tags {
        let tag_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
        .with_context(|| format!("upsert tag {name:?}"))?;

        sqlx::query(
            r#"
            INSERT INTO resource_tags (resource_id, tag_id) VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(resource_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await
        .context("link tag")?;
    }
    Ok(())
}

/// Returns false when no resource has this id.
pub async fn update_fields(
    db: &PgPool,
    id: i64,
    title: &str,
    description: Option<&str>,
    subject: Option<&str>,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE resources
           SET title = $2, description = $3, subject = $4
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(subject)
    .execute(db)
    .await
    .context("update resource")?;
    Ok(res.rows_affected() > 0)
}

/// Deletes the resource only if still owned by `owner_id`; comments, ratings and tag
/// links go with it. Returns the stored file path of the deleted row.
pub async fn delete_owned(
    db: &PgPool,
    id: i64,
    owner_id: i64,
) -> anyhow::Result<Option<Option<String>>> {
    let deleted = sqlx::query_scalar::<_, Option<String>>(
        r#"
        DELETE FROM resources
         WHERE id = $1 AND user_id = $2
        RETURNING file_path
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(db)
    .await
    .context("delete resource")?;
    Ok(deleted)
}
