use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::access;
use crate::models::profile::BabyProfile;
use crate::models::role::{BabyRole, UserBabyRole};
use crate::services::roles::RoleService;

/// Join-code alphabet: uppercase letters and digits minus I, O, 0 and 1,
/// which transcribe badly from a phone screen.
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const JOIN_CODE_LEN: usize = 6;

/// Minimum wait after a failed redemption attempt.
pub const COOLDOWN_WINDOW: Duration = Duration::from_millis(3000);

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Per-user cooldown after failed join attempts.
///
/// Process-local and unsynchronized with other instances: codes are short
/// enough to brute-force, and a 3-second lockout per user throttles guessing
/// without persistent state. Entries are dropped on success or once the
/// window has elapsed at check time; under a multi-instance deployment the
/// guarantee degrades to per-instance.
pub struct JoinCooldowns {
    window: Duration,
    last_failure: Mutex<HashMap<Uuid, Instant>>,
}

impl JoinCooldowns {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_failure: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, user_id: Uuid) -> Result<(), ApiError> {
        let mut map = self.last_failure.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(failed_at) = map.get(&user_id) {
            if failed_at.elapsed() < self.window {
                return Err(ApiError::RateLimited(
                    "Too many attempts, please wait before trying again".into(),
                ));
            }
            map.remove(&user_id);
        }
        Ok(())
    }

    pub fn record_failure(&self, user_id: Uuid) {
        let mut map = self.last_failure.lock().unwrap_or_else(|p| p.into_inner());
        map.insert(user_id, Instant::now());
    }

    pub fn clear(&self, user_id: Uuid) {
        let mut map = self.last_failure.lock().unwrap_or_else(|p| p.into_inner());
        map.remove(&user_id);
    }
}

impl Default for JoinCooldowns {
    fn default() -> Self {
        Self::new(COOLDOWN_WINDOW)
    }
}

/// Result of a successful redemption.
#[derive(Debug)]
pub struct JoinOutcome {
    pub profile: BabyProfile,
    pub role: UserBabyRole,
}

pub struct JoinCodeService;

impl JoinCodeService {
    /// Redeems an invitation code, granting the caller a viewer role.
    ///
    /// Wrong and disabled codes count as failures and arm the cooldown;
    /// being blocked or already a member does not — those callers are not
    /// guessing.
    pub async fn redeem(
        pool: &PgPool,
        cooldowns: &JoinCooldowns,
        user_id: Uuid,
        code: &str,
    ) -> Result<JoinOutcome, ApiError> {
        cooldowns.check(user_id)?;

        let code = normalize_code(code);
        let profile = sqlx::query_as::<_, BabyProfile>(
            "SELECT * FROM baby_profiles WHERE join_code = $1",
        )
        .bind(&code)
        .fetch_optional(pool)
        .await?;

        let profile = match profile {
            Some(p) => p,
            None => {
                cooldowns.record_failure(user_id);
                return Err(ApiError::NotFound("Join code not found".into()));
            }
        };

        if !profile.join_code_enabled {
            cooldowns.record_failure(user_id);
            return Err(ApiError::Forbidden("This join code is disabled".into()));
        }

        if let Some(existing) = access::resolve_role(pool, user_id, profile.id).await? {
            if existing.blocked {
                return Err(access::blocked());
            }
            return Err(ApiError::AlreadyJoined {
                profile,
                role: existing.role,
            });
        }

        // A concurrent redemption can slip past the membership check; the
        // UNIQUE constraint on (user, profile) is the actual safety net.
        let role = RoleService::grant(pool, user_id, profile.id, BabyRole::Viewer)
            .await
            .map_err(|e| {
                RoleService::absorb_duplicate(
                    e,
                    ApiError::AlreadyJoined {
                        profile: profile.clone(),
                        role: BabyRole::Viewer.to_string(),
                    },
                )
            })?;

        cooldowns.clear(user_id);
        Ok(JoinOutcome { profile, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_use_the_restricted_alphabet() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), JOIN_CODE_LEN);
            for c in code.chars() {
                assert!(JOIN_CODE_ALPHABET.contains(&(c as u8)), "unexpected char {c}");
                assert!(!"IO01".contains(c), "ambiguous char {c}");
            }
        }
    }

    #[test]
    fn codes_are_normalized_before_lookup() {
        assert_eq!(normalize_code("  ab2xyz "), "AB2XYZ");
    }

    #[test]
    fn cooldown_rejects_within_window_and_clears_after() {
        let cooldowns = JoinCooldowns::new(Duration::from_millis(30));
        let user = Uuid::new_v4();

        assert!(cooldowns.check(user).is_ok());
        cooldowns.record_failure(user);

        let err = cooldowns.check(user).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Too many attempts, please wait before trying again"
        );

        std::thread::sleep(Duration::from_millis(40));
        assert!(cooldowns.check(user).is_ok());
    }

    #[test]
    fn cooldown_is_per_user() {
        let cooldowns = JoinCooldowns::new(Duration::from_secs(60));
        let guessing = Uuid::new_v4();
        let other = Uuid::new_v4();

        cooldowns.record_failure(guessing);
        assert!(cooldowns.check(guessing).is_err());
        assert!(cooldowns.check(other).is_ok());
    }

    #[test]
    fn success_clears_the_cooldown_entry() {
        let cooldowns = JoinCooldowns::new(Duration::from_secs(60));
        let user = Uuid::new_v4();

        cooldowns.record_failure(user);
        cooldowns.clear(user);
        assert!(cooldowns.check(user).is_ok());
    }
}
