use std::str::FromStr;

use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

use super::{extractors::Identity, repo_types::User};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn can(self, capability: Capability) -> bool {
        match capability {
            Capability::VerifyUsers | Capability::ListUsers => self == Role::Admin,
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role {other:?}"),
        }
    }
}

/// Actions gated on the caller's role rather than on ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    VerifyUsers,
    ListUsers,
}

/// Owner-only mutation: the caller must be the stored owner. Anonymous resources have no owner.
pub fn ensure_owner(identity: &Identity, owner_id: Option<i64>) -> Result<(), AppError> {
    if owner_id == Some(identity.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Loads the caller's stored user and checks the capability against its role.
pub async fn require_capability(
    db: &PgPool,
    identity: &Identity,
    capability: Capability,
) -> Result<User, AppError> {
    let user = User::find_by_id(db, identity.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    if !user.role().can(capability) {
        warn!(user_id = user.id, ?capability, "capability denied");
        return Err(AppError::Forbidden);
    }
    Ok(user)
}
