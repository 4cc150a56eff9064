mod migrations;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use scheduler_core::bootstrap::{init_database, init_services, load_config};
use scheduler_core::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    logging::init_logging(&config.logging)?;
    info!("scheduler starting");

    let pool = init_database(&config).await?;
    migrations::run_migrations(&pool).await?;

    let services = init_services(pool.clone(), &config);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let router = scheduler_api::create_router(Arc::new(config.clone()), services, pool);

    let listener = tokio::net::TcpListener::bind(&http_addr).await.map_err(|e| {
        error!("failed to bind {http_addr}: {e}");
        e
    })?;
    info!(address = %http_addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("scheduler shut down gracefully");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}
