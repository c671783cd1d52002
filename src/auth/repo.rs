use crate::auth::repo_types::User;
use anyhow::Context;
use sqlx::PgPool;

const USER_COLUMNS: &str = "id, username, email, password_hash, verified, role, created_at";

impl User {
    /// Find a user by login name.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// True when either the username or the email is already registered.
    pub async fn username_or_email_taken(
        db: &PgPool,
        username: &str,
        email: &str,
    ) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)"#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(db)
        .await
        .context("check existing user")?;
        Ok(taken)
    }

    /// Create a new user with hashed password. Unique violations surface as `sqlx::Error`.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(db)
        .await
    }

    pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(db)
        .await
        .context("list users")?;
        Ok(users)
    }

    /// Marks the user verified; `None` if no such user.
    pub async fn set_verified(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET verified = TRUE WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("verify user")?;
        Ok(user)
    }

    /// Grants the admin role to the listed usernames; returns how many rows changed.
    pub async fn promote_admins(db: &PgPool, usernames: &[String]) -> anyhow::Result<u64> {
        if usernames.is_empty() {
            return Ok(0);
        }
        let res = sqlx::query(
            r#"UPDATE users SET role = 'admin' WHERE username = ANY($1) AND role <> 'admin'"#,
        )
        .bind(usernames)
        .execute(db)
        .await
        .context("promote admins")?;
        Ok(res.rows_affected())
    }
}
