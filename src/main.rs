use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bambino_api::{
    config::Config, db, middleware::auth::JwtSecret, routes,
    services::join_code::JoinCooldowns, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let state = AppState {
        db: pool,
        config: config.clone(),
        http: reqwest::Client::new(),
        join_cooldowns: Arc::new(JoinCooldowns::default()),
    };

    // Allow the configured app origin plus localhost for development.
    let base = config.app_base_url.clone();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        match origin.to_str() {
            Ok(o) => {
                o == base || o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1")
            }
            Err(_) => false,
        }
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/auth/google", post(routes::auth::google_login))
        .route("/auth/me", get(routes::auth::me).put(routes::auth::update_me))
        // Baby profiles
        .route("/profiles", get(routes::profiles::list_my_profiles).post(routes::profiles::create_profile))
        .route("/profiles/join", post(routes::profiles::join_by_code))
        .route("/profiles/{id}", put(routes::profiles::update_profile).delete(routes::profiles::delete_profile))
        .route("/profiles/{id}/join-code", put(routes::profiles::toggle_join_code))
        .route("/profiles/{id}/leave", post(routes::profiles::leave_profile))
        // Members
        .route("/profiles/{id}/members", get(routes::profiles::list_members))
        .route("/profiles/{id}/members/{member_id}/role", put(routes::profiles::change_member_role))
        .route("/profiles/{id}/members/{member_id}/blocked", put(routes::profiles::set_member_blocked))
        .route("/profiles/{id}/members/{member_id}", delete(routes::profiles::remove_member))
        // Actions
        .route("/actions", get(routes::actions::list_actions).post(routes::actions::create_action))
        .route("/actions/{id}", put(routes::actions::update_action).delete(routes::actions::delete_action))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("bambino API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
