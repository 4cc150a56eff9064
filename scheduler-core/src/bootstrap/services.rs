//! Service initialization and dependency injection

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::info;

use crate::cache::CountCache;
use crate::clock::{Clock, SystemClock};
use crate::repository::{
    PgBlockRepository, PgCatalogStore, PgCommandRepository, PgDisplayRepository,
    PgHistoryRepository, PgPlaylistRepository, PgTimelineRepository,
};
use crate::service::{CatalogSearchService, DisplayLocks, PlaylistManager, TimelineEngine};
use crate::Config;

/// Container for all initialized repositories and domain services,
/// handed to the HTTP layer as shared state.
#[derive(Clone)]
pub struct Services {
    pub displays: Arc<PgDisplayRepository>,
    pub playlists: Arc<PgPlaylistRepository>,
    pub blocks: Arc<PgBlockRepository>,
    pub commands: Arc<PgCommandRepository>,
    pub clock: Arc<dyn Clock>,
    pub catalog_search: CatalogSearchService,
    pub playlist_manager: PlaylistManager,
    pub timeline_engine: TimelineEngine,
}

/// Initialize all core services from a connected pool and loaded config.
pub fn init_services(pool: PgPool, config: &Config) -> Services {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let displays = Arc::new(PgDisplayRepository::new(pool.clone()));
    let playlists = Arc::new(PgPlaylistRepository::new(pool.clone()));
    let blocks = Arc::new(PgBlockRepository::new(pool.clone()));
    let timeline = Arc::new(PgTimelineRepository::new(pool.clone()));
    let history = Arc::new(PgHistoryRepository::new(pool.clone()));
    let commands = Arc::new(PgCommandRepository::new(pool.clone()));
    let catalog_store = Arc::new(PgCatalogStore::new(pool.clone()));

    let count_cache = CountCache::new(Duration::from_secs(config.scheduler.count_cache_ttl_seconds));
    let catalog_search = CatalogSearchService::with_probe_multiplier(
        catalog_store,
        count_cache,
        config.scheduler.min_term_length,
        config.scheduler.max_term_length_for_fresh_count,
        config.scheduler.random_sample_probe_multiplier,
    );
    info!("catalog search service initialized");

    let playlist_manager = PlaylistManager::new(
        playlists.clone(),
        blocks.clone(),
        displays.clone(),
        clock.clone(),
    );
    info!("playlist manager initialized");

    let locks = DisplayLocks::new();
    let timeline_engine = TimelineEngine::new(
        timeline,
        history,
        blocks.clone(),
        playlists.clone(),
        displays.clone(),
        catalog_search.clone(),
        clock.clone(),
        locks,
    );
    info!("timeline engine initialized");

    Services {
        displays,
        playlists,
        blocks,
        commands,
        clock,
        catalog_search,
        playlist_manager,
        timeline_engine,
    }
}
