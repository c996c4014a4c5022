//! Gateway Entry Point

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use auth::domain::RevocationRegistry;
use auth::{MemoryAuthStore, PgAuthRepository};
use gateway::{GatewayConfig, GatewayState, HttpUpstream, gateway_router};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = GatewayConfig::from_env(cfg!(debug_assertions))?;
    tracing::debug!(?config, "Gateway configuration loaded");

    // The revocation registry is shared with the auth service through its
    // database. Without one, logout is only honoured by the auth service.
    match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            tracing::info!("Connected to revocation registry");
            serve(config, Arc::new(PgAuthRepository::new(pool))).await
        }
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, revoked tokens are not checked at the gateway"
            );
            serve(config, Arc::new(MemoryAuthStore::new())).await
        }
    }
}

async fn serve<V>(config: GatewayConfig, revocations: Arc<V>) -> anyhow::Result<()>
where
    V: RevocationRegistry + Sync + 'static,
{
    let upstream = Arc::new(HttpUpstream::new(
        config.health_check_timeout,
        config.max_body_bytes,
    )?);

    let state = GatewayState::new(&config, revocations, upstream.clone(), upstream);
    let app = gateway_router(&config, state.clone());

    for route in &config.services {
        tracing::info!(service = %route.name, url = %route.url, "Service registered");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = state
        .monitor
        .clone()
        .spawn(config.health_check_interval, shutdown_rx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API Gateway listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Stop probing before connections drain.
        let _ = shutdown_tx.send(true);
    })
    .await?;

    if let Err(e) = monitor.await {
        tracing::warn!(error = %e, "Health monitor ended abnormally");
    }
    tracing::info!("Gracefully shutdown");

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gateway=info,gateway_server=info,tower_http=info".into());
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
