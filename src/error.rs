use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::profile::BabyProfile;

/// Service-layer error carrying its intended HTTP status.
///
/// Handlers return these directly; `IntoResponse` maps each kind to the
/// canonical status code and a `{ "error": ... }` body. Internal errors are
/// logged with full detail and return a generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    RateLimited(String),
    /// Join-code redemption by an existing member. Echoes the profile and the
    /// caller's current role so the client can route straight to it.
    #[error("You already have access to this baby profile")]
    AlreadyJoined { profile: BabyProfile, role: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, json!({ "error": msg })),
            ApiError::AlreadyJoined { profile, role } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "You already have access to this baby profile",
                    "babyProfile": profile,
                    "role": role,
                }),
            ),
            ApiError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;
    use uuid::Uuid;

    async fn body_of(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn already_joined_echoes_the_profile_and_role() {
        let profile = BabyProfile {
            id: Uuid::new_v4(),
            name: "Baby1".into(),
            birth_date: None,
            join_code: "AB2CD3".into(),
            join_code_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let profile_id = profile.id;

        let response = ApiError::AlreadyJoined {
            profile,
            role: "viewer".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_of(response).await;
        assert_eq!(body["error"], "You already have access to this baby profile");
        assert_eq!(body["role"], "viewer");
        assert_eq!(body["babyProfile"]["id"], profile_id.to_string());
        assert_eq!(body["babyProfile"]["joinCode"], "AB2CD3");
    }

    #[tokio::test]
    async fn unauthorized_body_carries_an_error_field() {
        let response =
            ApiError::Unauthorized("Missing Authorization header".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_of(response).await;
        assert_eq!(body["error"], "Missing Authorization header");
    }
}
