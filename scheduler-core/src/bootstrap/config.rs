//! Configuration loading

use anyhow::Result;
use tracing::info;

use crate::Config;

/// Load configuration, preferring `config/default.{toml,yaml}` and
/// falling back to `SCHEDULER__`-prefixed environment variables.
pub fn load_config() -> Result<Config> {
    let config = Config::load()?;

    info!(
        http_port = config.server.http_port,
        metrics_enabled = config.server.metrics_enabled,
        "configuration loaded"
    );

    Ok(config)
}
