use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// Comment joined with the commenter's username.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentView {
    pub id: i64,
    pub resource_id: i64,
    pub user_id: Option<i64>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub username: Option<String>,
}

pub async fn list_for_resource(db: &PgPool, resource_id: i64) -> anyhow::Result<Vec<CommentView>> {
    let rows = sqlx::query_as::<_, CommentView>(
        r#"
        SELECT c.id, c.resource_id, c.user_id, c.content, c.created_at, u.username
          FROM comments c
          LEFT JOIN users u ON u.id = c.user_id
         WHERE c.resource_id = $1
         ORDER BY c.id ASC
        "#,
    )
    .bind(resource_id)
    .fetch_all(db)
    .await
    .context("list comments")?;
    Ok(rows)
}

/// Inserts and returns the comment decorated with the author's name.
pub async fn insert(
    db: &PgPool,
    resource_id: i64,
    user_id: i64,
    content: &str,
) -> Result<CommentView, sqlx::Error> {
    sqlx::query_as::<_, CommentView>(
        r#"
        WITH inserted AS (
            INSERT INTO comments (resource_id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, resource_id, user_id, content, created_at
        )
        SELECT i.id, i.resource_id, i.user_id, i.content, i.created_at, u.username
          FROM inserted i
          LEFT JOIN users u ON u.id = i.user_id
        "#,
    )
    .bind(resource_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(db)
    .await
}
