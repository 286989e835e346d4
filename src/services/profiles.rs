use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::models::profile::{BabyProfile, ProfileWithRole, UpdateProfileRequest};
use crate::models::role::BabyRole;
use crate::services::join_code;
use crate::services::roles::RoleService;

fn profile_not_found() -> ApiError {
    ApiError::NotFound("Baby profile not found".into())
}

pub struct ProfileService;

impl ProfileService {
    /// Creates a profile and grants its creator the admin role. The join
    /// code is regenerated on the rare uniqueness collision.
    pub async fn create(
        pool: &PgPool,
        creator_id: Uuid,
        name: &str,
        birth_date: Option<chrono::NaiveDate>,
    ) -> Result<BabyProfile, ApiError> {
        let mut attempts = 0;
        let profile = loop {
            let code = join_code::generate_code();
            let inserted = sqlx::query_as::<_, BabyProfile>(
                "INSERT INTO baby_profiles (name, birth_date, join_code)
                 VALUES ($1, $2, $3)
                 RETURNING *",
            )
            .bind(name)
            .bind(birth_date)
            .bind(&code)
            .fetch_one(pool)
            .await;

            match inserted {
                Ok(p) => break p,
                Err(e) if db::is_unique_violation(&e) && attempts < 5 => {
                    attempts += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        };

        RoleService::grant(pool, creator_id, profile.id, BabyRole::Admin).await?;
        Ok(profile)
    }

    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ProfileWithRole>, ApiError> {
        let profiles = sqlx::query_as::<_, ProfileWithRole>(
            "SELECT p.*, r.role
             FROM baby_profiles p
             JOIN user_baby_roles r ON r.baby_profile_id = p.id
             WHERE r.user_id = $1 AND r.blocked = FALSE
             ORDER BY p.created_at",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(profiles)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateProfileRequest,
    ) -> Result<BabyProfile, ApiError> {
        let profile = sqlx::query_as::<_, BabyProfile>(
            "UPDATE baby_profiles
             SET name       = COALESCE($1, name),
                 birth_date = COALESCE($2, birth_date),
                 updated_at = NOW()
             WHERE id = $3
             RETURNING *",
        )
        .bind(&req.name)
        .bind(req.birth_date)
        .bind(id)
        .fetch_optional(pool)
        .await?;
        profile.ok_or_else(profile_not_found)
    }

    /// Deletes the profile; role rows go with it via FK cascade. Action rows
    /// are deliberately retained as a historical record (see DESIGN.md).
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM baby_profiles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(profile_not_found());
        }
        Ok(())
    }

    pub async fn set_join_code_enabled(
        pool: &PgPool,
        id: Uuid,
        enabled: bool,
    ) -> Result<BabyProfile, ApiError> {
        let profile = sqlx::query_as::<_, BabyProfile>(
            "UPDATE baby_profiles SET join_code_enabled = $1, updated_at = NOW()
             WHERE id = $2
             RETURNING *",
        )
        .bind(enabled)
        .bind(id)
        .fetch_optional(pool)
        .await?;
        profile.ok_or_else(profile_not_found)
    }
}
