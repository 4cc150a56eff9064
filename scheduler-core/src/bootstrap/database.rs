//! Database pool initialization

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use crate::Config;

/// Connect to Postgres and spawn a background task that periodically
/// samples pool usage into the metrics registry.
pub async fn init_database(config: &Config) -> Result<PgPool> {
    let database_url = config.database_url();
    info!(url = %mask_credentials(database_url), "connecting to database");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
        .connect(database_url)
        .await
        .map_err(|e| {
            error!("failed to connect to database: {e}");
            anyhow::anyhow!("database connection failed: {e}")
        })?;

    crate::metrics::database::DB_POOL_SIZE_MAX.set(i64::from(config.database.max_connections));

    let pool_clone = pool.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(15));
        loop {
            ticker.tick().await;
            let size = i64::from(pool_clone.size());
            let idle = i64::try_from(pool_clone.num_idle()).unwrap_or(i64::MAX);
            crate::metrics::database::DB_CONNECTIONS_ACTIVE.set(size - idle);
            crate::metrics::database::DB_CONNECTIONS_IDLE.set(idle);
        }
    });

    info!("database connected");

    Ok(pool)
}

fn mask_credentials(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map_or(0, |p| p + 3);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
