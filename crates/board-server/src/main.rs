mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use board_api::AppStateInner;
use board_api::cleanup;
use board_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "board=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);
    let state = AppStateInner::new(db, config.api.clone());

    // Block/attempt maintenance alongside the per-check pass
    tokio::spawn(cleanup::run_cleanup_loop(
        state.clone(),
        config.cleanup_interval_secs,
    ));

    let app = board_api::router(state, config.static_dir.as_deref());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Board server listening on {}", addr);
    if let Some(dir) = &config.static_dir {
        info!("Serving static files from {}", dir.display());
    }
    if config.api.allow_post_delete {
        info!("Post deletion is enabled");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
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
