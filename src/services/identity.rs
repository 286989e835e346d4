use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::auth::Claims;
use crate::models::user::{User, VerifiedIdentity};

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// The subset of Google's tokeninfo response we consume.
#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    sub: String,
    aud: String,
    email: String,
    name: Option<String>,
}

pub struct IdentityService;

impl IdentityService {
    /// Exchanges a Google ID token for a verified identity. The token is
    /// checked server-side against Google's tokeninfo endpoint and the
    /// audience must match our client id.
    pub async fn verify_google(
        http: &reqwest::Client,
        client_id: &str,
        id_token: &str,
    ) -> Result<VerifiedIdentity, ApiError> {
        let response = http
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Unauthorized("Invalid Google ID token".into()));
        }

        let info: GoogleTokenInfo = response
            .json()
            .await
            .map_err(|_| ApiError::Unauthorized("Invalid Google ID token".into()))?;

        if info.aud != client_id {
            return Err(ApiError::Unauthorized("Invalid Google ID token".into()));
        }

        Ok(VerifiedIdentity {
            external_id: info.sub,
            name: info.name.unwrap_or_else(|| info.email.clone()),
            email: info.email,
        })
    }

    /// Creates the local user on first verification; refreshes email and
    /// name on every subsequent one. The chosen emoji is in-app state and is
    /// never clobbered here.
    pub async fn upsert_user(pool: &PgPool, identity: &VerifiedIdentity) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (external_id, email, name)
             VALUES ($1, $2, $3)
             ON CONFLICT (external_id) DO UPDATE
             SET email = EXCLUDED.email, name = EXCLUDED.name, updated_at = NOW()
             RETURNING *",
        )
        .bind(&identity.external_id)
        .bind(&identity.email)
        .bind(&identity.name)
        .fetch_one(pool)
        .await?;
        Ok(user)
    }

    pub fn issue_token(user_id: Uuid, secret: &str, ttl_seconds: u64) -> Result<String, ApiError> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(e.into()))?;
        Ok(token)
    }
}
