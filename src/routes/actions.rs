use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::access,
    models::{
        action::{Action, ActionWithAuthor, CreateActionRequest, ListActionsQuery, UpdateActionRequest},
        auth::AuthenticatedUser,
        role::BabyRole,
    },
    services::actions::ActionService,
    AppState,
};

const WRITERS: &[BabyRole] = &[BabyRole::Admin, BabyRole::Editor];
const READERS: &[BabyRole] = &[BabyRole::Admin, BabyRole::Editor, BabyRole::Viewer];

/// The target profile comes from the request body here.
pub async fn create_action(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateActionRequest>,
) -> Result<(StatusCode, Json<Action>), ApiError> {
    let profile_id = access::require_profile_id(body.baby_profile_id, "babyProfileId")?;
    let action_type = body
        .action_type
        .ok_or_else(|| ApiError::Validation("actionType is required".into()))?;

    access::authorize(&state.db, user.user_id, profile_id, WRITERS).await?;

    let action = ActionService::create(
        &state.db,
        profile_id,
        user.user_id,
        action_type,
        body.details,
        body.user_emoji,
        body.timestamp,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(action)))
}

/// The target profile comes from the query string here.
pub async fn list_actions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListActionsQuery>,
) -> Result<Json<Vec<ActionWithAuthor>>, ApiError> {
    let profile_id = access::require_profile_id(query.baby_profile_id, "babyProfileId")?;
    access::authorize(&state.db, user.user_id, profile_id, READERS).await?;

    let actions = ActionService::list(&state.db, profile_id, &query).await?;
    Ok(Json(actions))
}

/// No profile-level guard: the action knows its own profile and the service
/// resolves the caller's role against it.
pub async fn update_action(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateActionRequest>,
) -> Result<Json<Action>, ApiError> {
    let action = ActionService::update(&state.db, id, user.user_id, body.details).await?;
    Ok(Json(action))
}

pub async fn delete_action(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    ActionService::delete(&state.db, id, user.user_id).await?;
    Ok(Json(json!({ "message": "Action deleted" })))
}
