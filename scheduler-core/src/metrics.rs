//! Prometheus metrics for the scheduler, exposed via an optional `/metrics`
//! endpoint gated by `ServerConfig::metrics_enabled`.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_with_registry, Encoder,
    IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry for this process.
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

pub mod poll {
    use super::{
        register_int_counter_vec_with_registry, register_int_gauge_with_registry, IntCounterVec,
        IntGauge, Opts, REGISTRY,
    };

    /// Total poll requests, labeled by outcome (`hit`, `empty`, `rollover`).
    pub static POLLS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("scheduler_polls_total", "Total number of display poll requests"),
            &["outcome"],
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_polls_total")
    });

    /// Number of currently-online displays (last_ping within the liveness threshold).
    pub static DISPLAYS_ONLINE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "scheduler_displays_online",
            "Number of displays considered online",
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_displays_online")
    });
}

pub mod catalog {
    use super::{register_int_counter_vec_with_registry, IntCounterVec, Opts, REGISTRY};

    /// Catalog count-cache hits/misses, labeled by outcome.
    pub static COUNT_CACHE: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("scheduler_catalog_count_cache_total", "Catalog count() cache hit/miss"),
            &["outcome"],
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_catalog_count_cache_total")
    });
}

pub mod timeline {
    use super::{register_int_counter_vec_with_registry, IntCounterVec, Opts, REGISTRY};

    /// Timeline rollovers, labeled by whether population yielded entries.
    pub static ROLLOVERS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("scheduler_rollovers_total", "Total timeline rollovers performed"),
            &["result"],
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_rollovers_total")
    });

    /// Videos marked played, labeled by whether the call was idempotent
    /// (already-played) or a real transition.
    pub static MARK_PLAYED_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("scheduler_mark_played_total", "Total mark-played calls"),
            &["outcome"],
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_mark_played_total")
    });
}

pub mod commands {
    use super::{register_int_counter_vec_with_registry, IntCounterVec, Opts, REGISTRY};

    /// Command enqueue/drain events, labeled by command type and direction.
    pub static COMMANDS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("scheduler_commands_total", "Commands enqueued or drained"),
            &["direction", "command_type"],
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_commands_total")
    });
}

pub mod database {
    use super::{register_int_gauge_with_registry, IntGauge, REGISTRY};

    /// Configured maximum pool size.
    pub static DB_POOL_SIZE_MAX: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "scheduler_db_pool_size_max",
            "Configured maximum database connection pool size",
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_db_pool_size_max")
    });

    /// Connections currently checked out of the pool.
    pub static DB_CONNECTIONS_ACTIVE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "scheduler_db_connections_active",
            "Database connections currently in use",
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_db_connections_active")
    });

    /// Idle connections held by the pool.
    pub static DB_CONNECTIONS_IDLE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "scheduler_db_connections_idle",
            "Idle database connections held by the pool",
            REGISTRY.clone()
        )
        .expect("failed to register scheduler_db_connections_idle")
    });
}

/// Render the current registry in the Prometheus text exposition format.
pub fn render() -> String {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .expect("failed to encode metrics");
    String::from_utf8(buffer).expect("metrics output is not valid utf-8")
}
