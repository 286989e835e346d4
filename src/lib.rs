// Library exports for tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::join_code::JoinCooldowns;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<config::Config>,
    pub http: reqwest::Client,
    /// Per-user join-code failure cooldowns. Process-local by design.
    pub join_cooldowns: Arc<JoinCooldowns>,
}
