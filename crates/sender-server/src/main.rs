mod config;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use sender_api::AppStateInner;
use sender_api::bootstrap::ensure_admin;
use sender_db::Database;

use crate::config::Config;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "sender=debug,sender_api=debug,sender_db=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and seed the admin account (Argon2 is slow, keep it off the runtime)
    let db_path = config.db_path.clone();
    let admin = config.admin.clone();
    let db = tokio::task::spawn_blocking(move || -> anyhow::Result<Database> {
        let db = Database::open(&db_path)?;
        ensure_admin(&db, &admin)?;
        Ok(db)
    })
    .await??;

    let state = AppStateInner::new(db, &config.jwt_secret);

    let app = sender_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Sender API listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
