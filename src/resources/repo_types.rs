use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Raw `resources` row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResourceRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub user_id: Option<i64>,
    pub file_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A resource decorated with its owner, tags and upvote count.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResourceView {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub user_id: Option<i64>,
    pub file_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub username: Option<String>,
    pub verified: bool,
    pub tags: Vec<String>,
    pub upvotes: i64,
}
