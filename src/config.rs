use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    /// Files live under a directory on the local filesystem.
    Local { upload_dir: String },
    /// S3/MinIO bucket.
    S3 {
        endpoint: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        region: String,
    },
}

/// Who may edit an existing resource (title/description/subject/tags).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EditPolicy {
    /// Any caller may edit, as long as the resource exists.
    Open,
    /// Only the resource's owner may edit.
    Owner,
}

impl EditPolicy {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "owner" => Ok(Self::Owner),
            other => anyhow::bail!("unknown RESOURCE_EDIT_POLICY: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    /// Usernames promoted to the admin role at startup and on registration.
    pub admin_usernames: Vec<String>,
    pub edit_policy: EditPolicy,
    pub cookie_secure: bool,
    pub cors_origin: Option<String>,
    pub upload_max_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "studyshare".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "studyshare-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };

        let storage = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".into())
            .as_str()
        {
            "s3" => StorageConfig::S3 {
                endpoint: std::env::var("S3_ENDPOINT")?,
                bucket: std::env::var("S3_BUCKET")?,
                access_key: std::env::var("S3_ACCESS_KEY")?,
                secret_key: std::env::var("S3_SECRET_KEY")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            },
            "local" => StorageConfig::Local {
                upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            },
            other => anyhow::bail!("unknown STORAGE_BACKEND: {other}"),
        };

        let admin_usernames = parse_list(&std::env::var("ADMIN_USERNAMES").unwrap_or_default());
        let edit_policy = match std::env::var("RESOURCE_EDIT_POLICY") {
            Ok(v) => EditPolicy::parse(&v)?,
            Err(_) => EditPolicy::Open,
        };
        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let cors_origin = std::env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty());
        let upload_max_bytes = std::env::var("UPLOAD_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(20 * 1024 * 1024);

        Ok(Self {
            database_url,
            jwt,
            storage,
            admin_usernames,
            edit_policy,
            cookie_secure,
            cors_origin,
            upload_max_bytes,
        })
    }

    pub fn is_bootstrap_admin(&self, username: &str) -> bool {
        self.admin_usernames.iter().any(|a| a == username)
    }
}

/// Splits a comma-separated env value, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_skips_blanks() {
        assert_eq!(parse_list(" admin, gvl718 ,,"), vec!["admin", "gvl718"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn edit_policy_parses_known_values() {
        assert_eq!(EditPolicy::parse("open").unwrap(), EditPolicy::Open);
        assert_eq!(EditPolicy::parse(" OWNER ").unwrap(), EditPolicy::Owner);
        assert!(EditPolicy::parse("anyone").is_err());
    }
}
