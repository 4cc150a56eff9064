//! Catalog count cache (§4.1): a process-local L1 Moka cache for
//! `CatalogSearchService::count`, grounded on the teacher's
//! `cache::room_cache::RoomCache` L1 tier — but, per SPEC_FULL §4/§9,
//! deliberately without the teacher's L2/Redis half: the contract pins
//! this cache as process-local only, with staleness up to TTL accepted
//! by design in multi-process deployments.

use std::time::Duration;

use crate::models::Orientation;

/// Cache key: a search term paired with the orientation filter it was
/// counted under (§4.1 "cache key is `(term, orientation)`").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountCacheKey {
    pub term: String,
    pub orientation: Orientation,
}

impl CountCacheKey {
    #[must_use]
    pub fn new(term: &str, orientation: Orientation) -> Self {
        Self {
            term: term.to_lowercase(),
            orientation,
        }
    }
}

/// Process-local count cache with a configurable TTL (default 2h per
/// §4.1). Concurrent readers may compute in parallel on a miss; last
/// write wins, matching the teacher's L1 Moka usage.
#[derive(Clone)]
pub struct CountCache {
    inner: moka::future::Cache<CountCacheKey, u64>,
}

impl CountCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: moka::future::Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub async fn get(&self, key: &CountCacheKey) -> Option<u64> {
        let hit = self.inner.get(key).await;
        let outcome = if hit.is_some() { "hit" } else { "miss" };
        crate::metrics::catalog::COUNT_CACHE.with_label_values(&[outcome]).inc();
        hit
    }

    pub async fn insert(&self, key: CountCacheKey, count: u64) {
        self.inner.insert(key, count).await;
    }

    /// Remove all entries; used in tests to force a fresh count.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
