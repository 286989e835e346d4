use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::role::{BabyRole, UserBabyRole};

/// A successful authorization: the caller's resolved role for the profile.
#[derive(Debug, Clone)]
pub struct RoleGrant {
    pub role: BabyRole,
    pub baby_profile_id: Uuid,
}

/// The single role-resolution primitive. Every authorization decision —
/// profile-level guard and the action manager's own-profile check alike —
/// reads through here.
pub async fn resolve_role(
    pool: &PgPool,
    user_id: Uuid,
    baby_profile_id: Uuid,
) -> Result<Option<UserBabyRole>, ApiError> {
    let record = sqlx::query_as::<_, UserBabyRole>(
        "SELECT * FROM user_baby_roles WHERE user_id = $1 AND baby_profile_id = $2",
    )
    .bind(user_id)
    .bind(baby_profile_id)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

pub fn no_access() -> ApiError {
    ApiError::Forbidden("No access to this baby profile".into())
}

pub fn blocked() -> ApiError {
    ApiError::Forbidden("You are blocked from this baby profile".into())
}

fn insufficient_role(required: &[BabyRole]) -> ApiError {
    let names: Vec<String> = required.iter().map(|r| r.to_string()).collect();
    ApiError::Forbidden(format!(
        "This operation requires one of the following roles: {}",
        names.join(", ")
    ))
}

/// Pure admission decision, separated from the lookup so the policy is
/// testable without a database. Each failure cause keeps its own message:
/// the client surfaces these directly.
pub fn check_access(record: Option<&UserBabyRole>, required: &[BabyRole]) -> Result<BabyRole, ApiError> {
    let record = record.ok_or_else(no_access)?;
    if record.blocked {
        return Err(blocked());
    }
    let role = record.role();
    if !required.contains(&role) {
        return Err(insufficient_role(required));
    }
    Ok(role)
}

/// Guard entry point: resolve the caller's role for the profile and admit or
/// reject against the operation's required role set.
pub async fn authorize(
    pool: &PgPool,
    user_id: Uuid,
    baby_profile_id: Uuid,
    required: &[BabyRole],
) -> Result<RoleGrant, ApiError> {
    let record = resolve_role(pool, user_id, baby_profile_id).await?;
    let role = check_access(record.as_ref(), required)?;
    Ok(RoleGrant {
        role,
        baby_profile_id,
    })
}

/// Routes resolve the target profile id from different sources (path, query
/// or body field); absent ids from the non-path sources are a 400 naming the
/// missing field.
pub fn require_profile_id(id: Option<Uuid>, field: &str) -> Result<Uuid, ApiError> {
    id.ok_or_else(|| ApiError::Validation(format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(role: &str, blocked: bool) -> UserBabyRole {
        UserBabyRole {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            baby_profile_id: Uuid::new_v4(),
            role: role.into(),
            blocked,
            created_at: Utc::now(),
        }
    }

    const WRITE: &[BabyRole] = &[BabyRole::Admin, BabyRole::Editor];
    const READ: &[BabyRole] = &[BabyRole::Admin, BabyRole::Editor, BabyRole::Viewer];

    #[test]
    fn missing_membership_is_no_access() {
        let err = check_access(None, READ).unwrap_err();
        assert_eq!(err.to_string(), "No access to this baby profile");
    }

    #[test]
    fn blocked_overrides_role() {
        let rec = record("admin", true);
        let err = check_access(Some(&rec), READ).unwrap_err();
        assert_eq!(err.to_string(), "You are blocked from this baby profile");
    }

    #[test]
    fn viewer_cannot_write() {
        let rec = record("viewer", false);
        let err = check_access(Some(&rec), WRITE).unwrap_err();
        assert_eq!(
            err.to_string(),
            "This operation requires one of the following roles: admin, editor"
        );
    }

    #[test]
    fn editor_admitted_for_writes() {
        let rec = record("editor", false);
        assert_eq!(check_access(Some(&rec), WRITE).unwrap(), BabyRole::Editor);
    }

    #[test]
    fn admin_only_set_names_admin() {
        let rec = record("editor", false);
        let err = check_access(Some(&rec), &[BabyRole::Admin]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "This operation requires one of the following roles: admin"
        );
    }

    #[test]
    fn missing_body_profile_id_is_a_400() {
        let err = require_profile_id(None, "babyProfileId").unwrap_err();
        assert_eq!(err.to_string(), "babyProfileId is required");
    }
}
