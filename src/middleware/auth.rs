use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::ApiError;
use crate::models::auth::{AuthenticatedUser, Claims};

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".into()))?;

        let secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("JWT secret not configured")))?;

        let user = decode_access_token(token, &secret.0)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

        Ok(user)
    }
}

/// Extension type to carry the JWT secret through request extensions.
#[derive(Clone)]
pub struct JwtSecret(pub String);

pub fn decode_access_token(token: &str, secret: &str) -> Result<AuthenticatedUser, anyhow::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &key, &validation)?;

    Ok(AuthenticatedUser {
        user_id: data.claims.sub.parse()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use uuid::Uuid;

    use crate::services::identity::IdentityService;

    fn parts_with(headers: &[(&str, String)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, value.clone());
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        parts.extensions.insert(JwtSecret("test-secret".into()));
        parts
    }

    #[tokio::test]
    async fn missing_header_gets_its_own_message() {
        let mut parts = parts_with(&[]);
        let err = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert_eq!(err.to_string(), "Missing Authorization header");
    }

    #[tokio::test]
    async fn non_bearer_header_is_a_format_error() {
        let mut parts = parts_with(&[("Authorization", "Basic abc".into())]);
        let err = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid Authorization header format");
    }

    #[tokio::test]
    async fn garbage_token_is_distinct_from_missing_header() {
        let mut parts = parts_with(&[("Authorization", "Bearer not-a-jwt".into())]);
        let err = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert_eq!(err.to_string(), "Invalid or expired token");
    }

    #[tokio::test]
    async fn valid_token_resolves_the_user() {
        let user_id = Uuid::new_v4();
        let token = IdentityService::issue_token(user_id, "test-secret", 60).unwrap();
        let mut parts = parts_with(&[("Authorization", format!("Bearer {token}"))]);
        let user = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(user.user_id, user_id);
    }
}
