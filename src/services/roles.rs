use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::middleware::access;
use crate::models::role::{BabyRole, ProfileMember, UserBabyRole};

/// Membership of one (user, profile) pair, as an explicit state rather than
/// existence checks scattered across handlers. `Blocked` wins over the role
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Absent,
    Active(BabyRole),
    Blocked,
}

impl Membership {
    pub fn of(record: Option<&UserBabyRole>) -> Self {
        match record {
            None => Membership::Absent,
            Some(r) if r.blocked => Membership::Blocked,
            Some(r) => Membership::Active(r.role()),
        }
    }

    /// Precondition for `change_role` and `remove`: the target must hold a
    /// record, blocked or not.
    pub fn ensure_member(&self) -> Result<(), ApiError> {
        match self {
            Membership::Absent => Err(ApiError::NotFound(
                "User is not part of this baby profile".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Precondition for `unblock`: absent pairs are a 404, unblocked pairs a
    /// 400 — never a silent no-op.
    pub fn ensure_unblockable(&self) -> Result<(), ApiError> {
        match self {
            Membership::Absent => Err(ApiError::NotFound(
                "User is not part of this baby profile".into(),
            )),
            Membership::Active(_) => Err(ApiError::Validation("User is not blocked".into())),
            Membership::Blocked => Ok(()),
        }
    }

    /// Precondition for `leave`: an admin leaving would strand the profile
    /// without one, so admins must delete the profile instead.
    pub fn ensure_can_leave(&self) -> Result<(), ApiError> {
        match self {
            Membership::Active(BabyRole::Admin) => Err(ApiError::Forbidden(
                "Admins cannot leave a baby profile, delete it instead".into(),
            )),
            _ => Ok(()),
        }
    }
}

fn forbid_self(caller_id: Uuid, target_id: Uuid, message: &str) -> Result<(), ApiError> {
    if caller_id == target_id {
        return Err(ApiError::Validation(message.into()));
    }
    Ok(())
}

pub struct RoleService;

impl RoleService {
    /// Creates the role row for a (user, profile) pair. The UNIQUE constraint
    /// on the pair is the real invariant; callers racing here must handle the
    /// duplicate-key error themselves.
    pub async fn grant(
        pool: &PgPool,
        user_id: Uuid,
        baby_profile_id: Uuid,
        role: BabyRole,
    ) -> Result<UserBabyRole, sqlx::Error> {
        sqlx::query_as::<_, UserBabyRole>(
            "INSERT INTO user_baby_roles (user_id, baby_profile_id, role)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(user_id)
        .bind(baby_profile_id)
        .bind(role.to_string())
        .fetch_one(pool)
        .await
    }

    /// Admin changes another member's role. Self-changes are rejected before
    /// any lookup; the target must already hold a record.
    pub async fn change_role(
        pool: &PgPool,
        caller_id: Uuid,
        baby_profile_id: Uuid,
        target_id: Uuid,
        role: &str,
    ) -> Result<UserBabyRole, ApiError> {
        forbid_self(caller_id, target_id, "You cannot change your own role")?;
        let role: BabyRole = role
            .parse()
            .map_err(|_| ApiError::Validation("Invalid role value".into()))?;

        let current = access::resolve_role(pool, target_id, baby_profile_id).await?;
        Membership::of(current.as_ref()).ensure_member()?;

        let updated = sqlx::query_as::<_, UserBabyRole>(
            "UPDATE user_baby_roles SET role = $1
             WHERE user_id = $2 AND baby_profile_id = $3
             RETURNING *",
        )
        .bind(role.to_string())
        .bind(target_id)
        .bind(baby_profile_id)
        .fetch_one(pool)
        .await?;
        Ok(updated)
    }

    /// Admin removes another member. Admins cannot remove themselves through
    /// this path; deleting the whole profile is the admin exit.
    pub async fn remove_member(
        pool: &PgPool,
        caller_id: Uuid,
        baby_profile_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), ApiError> {
        forbid_self(
            caller_id,
            target_id,
            "You cannot remove yourself from this baby profile",
        )?;

        let current = access::resolve_role(pool, target_id, baby_profile_id).await?;
        Membership::of(current.as_ref()).ensure_member()?;

        sqlx::query("DELETE FROM user_baby_roles WHERE user_id = $1 AND baby_profile_id = $2")
            .bind(target_id)
            .bind(baby_profile_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Self-service exit for non-admin members.
    pub async fn leave(pool: &PgPool, user_id: Uuid, baby_profile_id: Uuid) -> Result<(), ApiError> {
        let current = access::resolve_role(pool, user_id, baby_profile_id).await?;
        let membership = Membership::of(current.as_ref());
        membership.ensure_member().map_err(|_| access::no_access())?;
        membership.ensure_can_leave()?;

        sqlx::query("DELETE FROM user_baby_roles WHERE user_id = $1 AND baby_profile_id = $2")
            .bind(user_id)
            .bind(baby_profile_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Blocks or unblocks a target user.
    ///
    /// Blocking upserts: a user who never joined gets a row with the default
    /// role and blocked = TRUE, which makes any later join-code redemption
    /// fail with "blocked" rather than granting access. Blocking twice is
    /// idempotent and never creates a second row.
    pub async fn set_blocked(
        pool: &PgPool,
        caller_id: Uuid,
        baby_profile_id: Uuid,
        target_id: Uuid,
        blocked: bool,
    ) -> Result<UserBabyRole, ApiError> {
        forbid_self(caller_id, target_id, "You cannot block yourself")?;

        if blocked {
            let updated = sqlx::query_as::<_, UserBabyRole>(
                "INSERT INTO user_baby_roles (user_id, baby_profile_id, role, blocked)
                 VALUES ($1, $2, $3, TRUE)
                 ON CONFLICT (user_id, baby_profile_id) DO UPDATE SET blocked = TRUE
                 RETURNING *",
            )
            .bind(target_id)
            .bind(baby_profile_id)
            .bind(BabyRole::DEFAULT.to_string())
            .fetch_one(pool)
            .await?;
            return Ok(updated);
        }

        let current = access::resolve_role(pool, target_id, baby_profile_id).await?;
        Membership::of(current.as_ref()).ensure_unblockable()?;

        let updated = sqlx::query_as::<_, UserBabyRole>(
            "UPDATE user_baby_roles SET blocked = FALSE
             WHERE user_id = $1 AND baby_profile_id = $2
             RETURNING *",
        )
        .bind(target_id)
        .bind(baby_profile_id)
        .fetch_one(pool)
        .await?;
        Ok(updated)
    }

    pub async fn list_members(
        pool: &PgPool,
        baby_profile_id: Uuid,
    ) -> Result<Vec<ProfileMember>, ApiError> {
        let members = sqlx::query_as::<_, ProfileMember>(
            "SELECT u.id AS user_id, u.name, u.email, u.emoji,
                    r.role, r.blocked, r.created_at AS joined_at
             FROM user_baby_roles r
             JOIN users u ON u.id = r.user_id
             WHERE r.baby_profile_id = $1
             ORDER BY r.created_at",
        )
        .bind(baby_profile_id)
        .fetch_all(pool)
        .await?;
        Ok(members)
    }

    /// Maps a duplicate-key failure from `grant` to the given error; anything
    /// else stays a 500. Concurrent grants race past the pre-check, so the
    /// constraint is the safety net, not a fatal condition.
    pub fn absorb_duplicate(e: sqlx::Error, already: ApiError) -> ApiError {
        if db::is_unique_violation(&e) {
            already
        } else {
            e.into()
        }
    }
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

    #[test]
    fn membership_states() {
        assert_eq!(Membership::of(None), Membership::Absent);
        assert_eq!(
            Membership::of(Some(&record("editor", false))),
            Membership::Active(BabyRole::Editor)
        );
        assert_eq!(Membership::of(Some(&record("editor", true))), Membership::Blocked);
    }

    #[test]
    fn change_role_requires_existing_record() {
        let err = Membership::Absent.ensure_member().unwrap_err();
        assert_eq!(err.to_string(), "User is not part of this baby profile");
        assert!(Membership::Blocked.ensure_member().is_ok());
    }

    #[test]
    fn unblock_preconditions() {
        assert_eq!(
            Membership::Absent.ensure_unblockable().unwrap_err().to_string(),
            "User is not part of this baby profile"
        );
        assert_eq!(
            Membership::Active(BabyRole::Viewer)
                .ensure_unblockable()
                .unwrap_err()
                .to_string(),
            "User is not blocked"
        );
        assert!(Membership::Blocked.ensure_unblockable().is_ok());
    }

    #[test]
    fn admins_cannot_leave_their_profile() {
        let err = Membership::Active(BabyRole::Admin).ensure_can_leave().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Admins cannot leave a baby profile, delete it instead"
        );
        assert!(Membership::Active(BabyRole::Viewer).ensure_can_leave().is_ok());
        assert!(Membership::Active(BabyRole::Editor).ensure_can_leave().is_ok());
    }

    #[test]
    fn self_targeting_is_rejected_before_anything_else() {
        let id = Uuid::new_v4();
        let err = forbid_self(id, id, "You cannot change your own role").unwrap_err();
        assert_eq!(err.to_string(), "You cannot change your own role");
        assert!(forbid_self(id, Uuid::new_v4(), "x").is_ok());
    }
}
