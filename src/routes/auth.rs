use axum::{extract::State, Json};

use crate::{
    error::ApiError,
    models::{
        auth::AuthenticatedUser,
        user::{GoogleLoginRequest, LoginResponse, UpdateMeRequest, User, UserPublic},
    },
    services::identity::IdentityService,
    AppState,
};

/// Exchanges a Google ID token for an access token, creating or refreshing
/// the local user record.
pub async fn google_login(
    State(state): State<AppState>,
    Json(body): Json<GoogleLoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let identity =
        IdentityService::verify_google(&state.http, &state.config.google_client_id, &body.id_token)
            .await?;
    let user = IdentityService::upsert_user(&state.db, &identity).await?;
    let token = IdentityService::issue_token(
        user.id,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )?;

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserPublic>, ApiError> {
    let record = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(record.into()))
}

/// Self-service display edits (name, emoji).
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<UserPublic>, ApiError> {
    let record = sqlx::query_as::<_, User>(
        "UPDATE users
         SET name = COALESCE($1, name),
             emoji = COALESCE($2, emoji),
             updated_at = NOW()
         WHERE id = $3
         RETURNING *",
    )
    .bind(&body.name)
    .bind(&body.emoji)
    .bind(user.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(record.into()))
}
