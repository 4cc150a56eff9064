//! Catalog Search Service (C3, §4.1): translates a (term, count, mode,
//! orientation, exclude-set) request into a deterministic list of video
//! records, with a process-local count cache.

use std::sync::Arc;

use crate::cache::{CountCache, CountCacheKey};
use crate::models::{FetchMode, Orientation, VideoId, VideoRecord};
use crate::repository::catalog::{CatalogStore, FetchMode as RepoFetchMode, SelectQuery};
use crate::{Error, Result};

/// Minimum count returned by the short-term fast path (§4.1 "terms
/// shorter than 2 characters fast-path to a conventional minimum").
const SHORT_TERM_FAST_PATH_COUNT: u64 = 0;

#[derive(Clone)]
pub struct CatalogSearchService {
    store: Arc<dyn CatalogStore>,
    count_cache: CountCache,
    min_term_length: usize,
    max_term_length_for_fresh_count: usize,
    probe_multiplier: u32,
}

impl CatalogSearchService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CatalogStore>,
        count_cache: CountCache,
        min_term_length: usize,
        max_term_length_for_fresh_count: usize,
    ) -> Self {
        Self::with_probe_multiplier(store, count_cache, min_term_length, max_term_length_for_fresh_count, 3)
    }

    #[must_use]
    pub fn with_probe_multiplier(
        store: Arc<dyn CatalogStore>,
        count_cache: CountCache,
        min_term_length: usize,
        max_term_length_for_fresh_count: usize,
        probe_multiplier: u32,
    ) -> Self {
        Self {
            store,
            count_cache,
            min_term_length,
            max_term_length_for_fresh_count,
            probe_multiplier,
        }
    }

    fn validate_term(term: &str) -> Result<()> {
        if term.trim().is_empty() {
            return Err(Error::InvalidArgument("search term must not be empty".to_string()));
        }
        Ok(())
    }

    /// `count(term, orientation)` with the process-local TTL cache
    /// (§4.1). Terms shorter than `min_term_length` fast-path to a
    /// conventional minimum without touching the catalog at all; terms
    /// longer than `max_term_length_for_fresh_count` may answer from a
    /// stale cache entry rather than issuing a fresh scan.
    pub async fn count(&self, term: &str, orientation: Orientation) -> Result<u64> {
        Self::validate_term(term)?;

        if term.trim().chars().count() < self.min_term_length {
            return Ok(SHORT_TERM_FAST_PATH_COUNT);
        }

        let key = CountCacheKey::new(term, orientation);

        if term.len() > self.max_term_length_for_fresh_count {
            if let Some(cached) = self.count_cache.get(&key).await {
                return Ok(cached);
            }
            // No cached estimate yet: fall through to a fresh (one-time) scan.
        } else if let Some(cached) = self.count_cache.get(&key).await {
            return Ok(cached);
        }

        let fresh = self.store.count(term, orientation).await?;
        self.count_cache.insert(key, fresh).await;
        Ok(fresh)
    }

    /// `select(term, count, mode, orientation, exclude_set)` (§4.1).
    /// Delegates matching/sampling to the `CatalogStore`; this layer only
    /// owns input validation and the count-cache concern.
    pub async fn select(
        &self,
        term: &str,
        count: u32,
        mode: FetchMode,
        orientation: Orientation,
        exclude: &std::collections::HashSet<VideoId>,
    ) -> Result<Vec<VideoRecord>> {
        Self::validate_term(term)?;
        if count == 0 {
            return Err(Error::InvalidArgument("count must be positive".to_string()));
        }

        self.store
            .select(SelectQuery {
                term,
                count,
                mode: RepoFetchMode::from(mode),
                orientation,
                exclude,
                probe_multiplier: self.probe_multiplier,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::catalog::fake::FakeCatalogStore;
    use chrono::{TimeZone, Utc};

    fn mk(id: &str, text: &str, w: i32, h: i32, ts: i64) -> VideoRecord {
        VideoRecord {
            video_id: VideoId::from_string(id.to_string()),
            creator: crate::models::CreatorInfo {
                id: "c1".into(),
                username: "c1".into(),
                display_name: "Creator".into(),
            },
            text: text.to_string(),
            posted_at: Utc.timestamp_opt(ts, 0).unwrap(),
            permalink: format!("https://example/{id}"),
            width: w,
            height: h,
            encodings: crate::models::MediaEncodings {
                source: "https://example/src".into(),
                md: None,
                thumbnail: None,
                gif: None,
            },
        }
    }

    fn service(records: Vec<VideoRecord>) -> CatalogSearchService {
        let store: Arc<dyn CatalogStore> = Arc::new(FakeCatalogStore::new(records));
        CatalogSearchService::new(store, CountCache::new(std::time::Duration::from_secs(3600)), 2, 30)
    }

    #[tokio::test]
    async fn empty_term_is_invalid_argument() {
        let svc = service(vec![]);
        let err = svc.count("", Orientation::Mixed).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn short_term_fast_paths_without_touching_store() {
        let svc = service(vec![mk("v1", "a sunset", 10, 5, 1)]);
        let count = svc.count("a", Orientation::Mixed).await.unwrap();
        assert_eq!(count, SHORT_TERM_FAST_PATH_COUNT);
    }

    #[tokio::test]
    async fn count_is_cached_across_calls() {
        let svc = service(vec![mk("v1", "sunset video", 10, 5, 1), mk("v2", "sunset again", 10, 5, 2)]);
        let first = svc.count("sunset", Orientation::Mixed).await.unwrap();
        assert_eq!(first, 2);
        let second = svc.count("sunset", Orientation::Mixed).await.unwrap();
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn select_zero_count_is_invalid() {
        let svc = service(vec![]);
        let err = svc
            .select("sunset", 0, FetchMode::Newest, Orientation::Mixed, &Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn select_respects_exclusion_and_orientation() {
        let svc = service(vec![
            mk("v1", "city lights", 20, 10, 1),
            mk("v2", "city lights tall", 10, 20, 2),
        ]);
        let mut exclude = std::collections::HashSet::new();
        exclude.insert(VideoId::from_string("v1".to_string()));
        let result = svc
            .select("city", 5, FetchMode::Newest, Orientation::Mixed, &exclude)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].video_id.as_str(), "v2");
    }
}
