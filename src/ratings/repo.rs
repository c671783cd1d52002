use anyhow::Context;
use sqlx::PgPool;

/// Records the caller's upvote. Repeating it only re-sets the value, so the
/// primary key on (resource_id, user_id) keeps one row per voter even under
/// concurrent identical requests.
pub async fn upsert_upvote(db: &PgPool, resource_id: i64, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO resource_ratings (resource_id, user_id, value)
        VALUES ($1, $2, 1)
        ON CONFLICT (resource_id, user_id) DO UPDATE SET value = 1
        "#,
    )
    .bind(resource_id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn count_upvotes(db: &PgPool, resource_id: i64) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM resource_ratings WHERE resource_id = $1"#,
    )
    .bind(resource_id)
    .fetch_one(db)
    .await
    .context("count ratings")?;
    Ok(n)
}
