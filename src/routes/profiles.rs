use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::access,
    models::{
        auth::AuthenticatedUser,
        profile::{
            BabyProfile, CreateProfileRequest, JoinByCodeRequest, ProfileWithRole,
            ToggleJoinCodeRequest, UpdateProfileRequest,
        },
        role::{BabyRole, ChangeRoleRequest, ProfileMember, SetBlockedRequest, UserBabyRole},
    },
    services::{join_code::JoinCodeService, profiles::ProfileService, roles::RoleService},
    AppState,
};

const ANY_MEMBER: &[BabyRole] = &[BabyRole::Admin, BabyRole::Editor, BabyRole::Viewer];
const ADMIN_ONLY: &[BabyRole] = &[BabyRole::Admin];

pub async fn create_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<BabyProfile>), ApiError> {
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::Validation("Name is required".into()))?;

    let profile = ProfileService::create(&state.db, user.user_id, name, body.birth_date).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn list_my_profiles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ProfileWithRole>>, ApiError> {
    let profiles = ProfileService::list_for_user(&state.db, user.user_id).await?;
    Ok(Json(profiles))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<BabyProfile>, ApiError> {
    access::authorize(&state.db, user.user_id, id, ADMIN_ONLY).await?;
    let profile = ProfileService::update(&state.db, id, &body).await?;
    Ok(Json(profile))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    access::authorize(&state.db, user.user_id, id, ADMIN_ONLY).await?;
    ProfileService::delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "Baby profile deleted" })))
}

pub async fn toggle_join_code(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleJoinCodeRequest>,
) -> Result<Json<BabyProfile>, ApiError> {
    access::authorize(&state.db, user.user_id, id, ADMIN_ONLY).await?;
    let profile = ProfileService::set_join_code_enabled(&state.db, id, body.enabled).await?;
    Ok(Json(profile))
}

/// Side entrance to the role store: the caller has no role yet, so there is
/// no profile-level guard here — the join-code gate does its own checks.
pub async fn join_by_code(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<JoinByCodeRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome =
        JoinCodeService::redeem(&state.db, &state.join_cooldowns, user.user_id, &body.code).await?;
    Ok(Json(json!({
        "babyProfile": outcome.profile,
        "role": outcome.role.role,
        "joinedAt": outcome.role.created_at,
    })))
}

pub async fn leave_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    access::authorize(&state.db, user.user_id, id, ANY_MEMBER).await?;
    RoleService::leave(&state.db, user.user_id, id).await?;
    Ok(Json(json!({ "message": "Left baby profile" })))
}

pub async fn list_members(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProfileMember>>, ApiError> {
    access::authorize(&state.db, user.user_id, id, ANY_MEMBER).await?;
    let members = RoleService::list_members(&state.db, id).await?;
    Ok(Json(members))
}

pub async fn change_member_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<Json<UserBabyRole>, ApiError> {
    access::authorize(&state.db, user.user_id, id, ADMIN_ONLY).await?;
    let updated =
        RoleService::change_role(&state.db, user.user_id, id, member_id, &body.role).await?;
    Ok(Json(updated))
}

pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    access::authorize(&state.db, user.user_id, id, ADMIN_ONLY).await?;
    RoleService::remove_member(&state.db, user.user_id, id, member_id).await?;
    Ok(Json(json!({ "message": "Member removed" })))
}

pub async fn set_member_blocked(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetBlockedRequest>,
) -> Result<Json<UserBabyRole>, ApiError> {
    access::authorize(&state.db, user.user_id, id, ADMIN_ONLY).await?;
    let updated =
        RoleService::set_blocked(&state.db, user.user_id, id, member_id, body.blocked).await?;
    Ok(Json(updated))
}
