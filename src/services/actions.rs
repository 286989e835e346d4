use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::access;
use crate::models::action::{Action, ActionDetails, ActionType, ActionWithAuthor, ListActionsQuery};
use crate::models::role::BabyRole;
use crate::models::user::UserPublic;

fn action_not_found() -> ApiError {
    ApiError::NotFound("Action not found".into())
}

fn edit_forbidden() -> ApiError {
    ApiError::Forbidden("You do not have permission to edit this action".into())
}

fn delete_forbidden() -> ApiError {
    ApiError::Forbidden("Only admins can delete actions".into())
}

/// Ownership refinement on top of membership: admins edit anything, editors
/// only their own entries, viewers nothing.
pub fn can_edit(role: BabyRole, author_id: Uuid, caller_id: Uuid) -> bool {
    match role {
        BabyRole::Admin => true,
        BabyRole::Editor => author_id == caller_id,
        BabyRole::Viewer => false,
    }
}

/// Deletion is stricter than editing: ownership does not matter, only the
/// admin role does.
pub fn can_delete(role: BabyRole) -> bool {
    role == BabyRole::Admin
}

#[derive(sqlx::FromRow)]
struct ActionAuthorRow {
    id: Uuid,
    baby_profile_id: Uuid,
    action_type: String,
    details: Value,
    user_emoji: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_id: Uuid,
    author_name: String,
    author_email: String,
    author_emoji: Option<String>,
}

impl From<ActionAuthorRow> for ActionWithAuthor {
    fn from(r: ActionAuthorRow) -> Self {
        ActionWithAuthor {
            id: r.id,
            baby_profile_id: r.baby_profile_id,
            action_type: r.action_type,
            details: r.details,
            user_emoji: r.user_emoji,
            created_at: r.created_at,
            updated_at: r.updated_at,
            user: UserPublic {
                id: r.author_id,
                name: r.author_name,
                email: r.author_email,
                emoji: r.author_emoji,
            },
        }
    }
}

pub struct ActionService;

impl ActionService {
    /// Creates an action. The caller has already been admitted with
    /// {admin, editor}; details are validated against the action type before
    /// anything touches the database. A caller-supplied `timestamp` backdates
    /// both created_at and updated_at.
    pub async fn create(
        pool: &PgPool,
        baby_profile_id: Uuid,
        user_id: Uuid,
        action_type: ActionType,
        details: Option<Value>,
        user_emoji: Option<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Action, ApiError> {
        let raw = details.unwrap_or_else(|| Value::Object(Default::default()));
        let details = ActionDetails::validate(action_type, raw)?;
        let at = timestamp.unwrap_or_else(Utc::now);

        let action = sqlx::query_as::<_, Action>(
            "INSERT INTO actions (baby_profile_id, user_id, action_type, details, user_emoji, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING *",
        )
        .bind(baby_profile_id)
        .bind(user_id)
        .bind(action_type.to_string())
        .bind(details.to_value())
        .bind(user_emoji)
        .bind(at)
        .fetch_one(pool)
        .await?;
        Ok(action)
    }

    /// Lists a profile's actions newest-first, author fields resolved,
    /// creation timestamp bounded inclusively by the optional date filters.
    pub async fn list(
        pool: &PgPool,
        baby_profile_id: Uuid,
        filters: &ListActionsQuery,
    ) -> Result<Vec<ActionWithAuthor>, ApiError> {
        let rows = sqlx::query_as::<_, ActionAuthorRow>(
            "SELECT a.id, a.baby_profile_id, a.action_type, a.details, a.user_emoji,
                    a.created_at, a.updated_at,
                    u.id AS author_id, u.name AS author_name,
                    u.email AS author_email, u.emoji AS author_emoji
             FROM actions a
             JOIN users u ON u.id = a.user_id
             WHERE a.baby_profile_id = $1
               AND ($2::timestamptz IS NULL OR a.created_at >= $2)
               AND ($3::timestamptz IS NULL OR a.created_at <= $3)
             ORDER BY a.created_at DESC",
        )
        .bind(baby_profile_id)
        .bind(filters.start_date)
        .bind(filters.end_date)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Updates an action's details. Skips the profile-level guard: the action
    /// carries its own profile id, so the caller's role is resolved from that
    /// directly. Membership absence, blocked and ownership violations each
    /// keep their own message.
    pub async fn update(
        pool: &PgPool,
        action_id: Uuid,
        caller_id: Uuid,
        details: Option<Value>,
    ) -> Result<Action, ApiError> {
        let action = Self::fetch(pool, action_id).await?;

        let record = access::resolve_role(pool, caller_id, action.baby_profile_id).await?;
        let record = record.ok_or_else(access::no_access)?;
        if record.blocked {
            return Err(access::blocked());
        }
        if !can_edit(record.role(), action.user_id, caller_id) {
            return Err(edit_forbidden());
        }

        let action_type: ActionType = action
            .action_type
            .parse()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("corrupt action type on {action_id}")))?;
        let raw = details.unwrap_or_else(|| action.details.clone());
        let validated = ActionDetails::validate(action_type, raw)?;

        let updated = sqlx::query_as::<_, Action>(
            "UPDATE actions SET details = $1, updated_at = NOW()
             WHERE id = $2
             RETURNING *",
        )
        .bind(validated.to_value())
        .bind(action_id)
        .fetch_one(pool)
        .await?;
        Ok(updated)
    }

    /// Deletes an action; admin of the owning profile only.
    pub async fn delete(pool: &PgPool, action_id: Uuid, caller_id: Uuid) -> Result<(), ApiError> {
        let action = Self::fetch(pool, action_id).await?;

        let record = access::resolve_role(pool, caller_id, action.baby_profile_id).await?;
        let record = record.ok_or_else(access::no_access)?;
        if record.blocked {
            return Err(access::blocked());
        }
        if !can_delete(record.role()) {
            return Err(delete_forbidden());
        }

        sqlx::query("DELETE FROM actions WHERE id = $1")
            .bind(action_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Existence is checked before any role resolution: with no action there
    /// is no profile to resolve a role against.
    async fn fetch(pool: &PgPool, action_id: Uuid) -> Result<Action, ApiError> {
        sqlx::query_as::<_, Action>("SELECT * FROM actions WHERE id = $1")
            .bind(action_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(action_not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_edit_any_action() {
        let author = Uuid::new_v4();
        let admin = Uuid::new_v4();
        assert!(can_edit(BabyRole::Admin, author, admin));
        assert!(can_edit(BabyRole::Admin, admin, admin));
    }

    #[test]
    fn editors_edit_only_their_own() {
        let author = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(can_edit(BabyRole::Editor, author, author));
        assert!(!can_edit(BabyRole::Editor, author, other));
    }

    #[test]
    fn viewers_never_edit() {
        let user = Uuid::new_v4();
        assert!(!can_edit(BabyRole::Viewer, user, user));
    }

    #[test]
    fn only_admins_delete_even_their_own_entries() {
        assert!(can_delete(BabyRole::Admin));
        assert!(!can_delete(BabyRole::Editor));
        assert!(!can_delete(BabyRole::Viewer));
        assert_eq!(delete_forbidden().to_string(), "Only admins can delete actions");
    }

    #[test]
    fn forbidden_messages_are_distinct_per_cause() {
        assert_eq!(
            edit_forbidden().to_string(),
            "You do not have permission to edit this action"
        );
        assert_eq!(access::no_access().to_string(), "No access to this baby profile");
    }
}
