//! Auth Service Entry Point
//!
//! Uses `anyhow` for startup errors; request-level errors go through
//! `kernel::error::AppError`.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::{
    Argon2PasswordHasher, AuthConfig, AuthServices, LogEventPublisher, PgAuthRepository,
    SideEffectDispatcher, auth_router, health_router, spawn_side_effect_worker,
};
use axum::{
    Json, Router,
    extract::State,
    http::{self, Method, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use platform::config::{DurationUnit, env_duration, env_parse};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AuthConfig::from_env(cfg!(debug_assertions))?;
    tracing::debug!(?config, "Auth configuration loaded");

    // Database connection
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in environment"))?;

    let pool = PgPoolOptions::new()
        .max_connections(env_parse("DATABASE_MAX_CONNECTIONS", 10u32)?)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let repo = PgAuthRepository::new(pool);

    // First pass runs at startup; failures never stop the server
    let cleanup_interval = env_duration(
        "CLEANUP_INTERVAL",
        DEFAULT_CLEANUP_INTERVAL,
        DurationUnit::Seconds,
    )?;
    let cleanup = tokio::spawn(cleanup_expired_periodically(repo.clone(), cleanup_interval));

    // Audit rows and domain events are written off the request path
    let (dispatcher, rx) = SideEffectDispatcher::channel(config.event_queue_capacity);
    let worker = spawn_side_effect_worker(rx, Arc::new(repo.clone()), Arc::new(LogEventPublisher));

    let hasher = Argon2PasswordHasher::new(config.password_pepper.clone());
    let api_prefix = env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string());
    let port: u16 = env_parse("PORT", 3001u16)?;

    let services = AuthServices::new(config, Arc::new(hasher), dispatcher);

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest(&format!("{api_prefix}/auth"), auth_router(repo.clone(), services))
        .merge(health_router())
        .route("/health/ready", get(ready).with_state(repo))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cleanup.abort();

    // Every sender is gone once the router is dropped; the worker drains
    // what is left in the queue and exits.
    match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Side-effect worker ended abnormally"),
        Err(_) => tracing::warn!("Side-effect worker did not drain in time"),
    }
    tracing::info!("Gracefully shutdown");

    Ok(())
}

/// Delete lapsed revocation and session rows every `every`.
async fn cleanup_expired_periodically(repo: PgAuthRepository, every: Duration) {
    // interval() panics on zero
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = repo.cleanup_expired().await {
            tracing::warn!(error = %e, "Auth cleanup failed, retrying next interval");
        }
    }
}

/// GET /health/ready
async fn ready(State(repo): State<PgAuthRepository>) -> impl IntoResponse {
    match repo.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api=info,auth=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
