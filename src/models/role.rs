use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BabyRole {
    Admin,
    Editor,
    Viewer,
}

impl BabyRole {
    /// Role assigned when an admin blocks a user who was never a member.
    pub const DEFAULT: BabyRole = BabyRole::Viewer;
}

impl std::fmt::Display for BabyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BabyRole::Admin => "admin",
            BabyRole::Editor => "editor",
            BabyRole::Viewer => "viewer",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BabyRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(BabyRole::Admin),
            "editor" => Ok(BabyRole::Editor),
            "viewer" => Ok(BabyRole::Viewer),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// The authorization edge between a user and a baby profile.
/// Exactly one row exists per (user, profile) pair; `created_at` doubles as
/// the member's joined-at timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBabyRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub baby_profile_id: Uuid,
    /// Stored as TEXT; parse via [`UserBabyRole::role`].
    pub role: String,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl UserBabyRole {
    pub fn role(&self) -> BabyRole {
        self.role.parse().unwrap_or(BabyRole::DEFAULT)
    }
}

/// A profile member as returned by the members listing: public user fields
/// joined onto the role row.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMember {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub emoji: Option<String>,
    pub role: String,
    pub blocked: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBlockedRequest {
    pub blocked: bool,
}
