use anyhow::Result;
use sqlx::PgPool;
use tracing::{error, info};

/// Execute `sqlx::migrate!` against the pool. This is the single place
/// that calls the migration macro so it is never duplicated.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("running database migrations");
    sqlx::migrate!("../migrations").run(pool).await.map_err(|e| {
        error!("failed to run migrations: {e}");
        anyhow::anyhow!("migration failed: {e}")
    })?;
    info!("migrations completed");
    Ok(())
}
