//! Catalog Store (C1): a read-only view over the indexed post catalog.
//!
//! The scheduler never writes to this store and never assumes a selected
//! video still exists once chosen — if a later play fails, the display
//! reports completion and the engine moves on (§5).

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row};

use crate::models::{CreatorInfo, MediaEncodings, Orientation, VideoId, VideoRecord};
use crate::{Error, Result};

/// How a catalog selection is sampled from its matching universe (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Newest,
    Random,
}

impl From<crate::models::FetchMode> for FetchMode {
    fn from(value: crate::models::FetchMode) -> Self {
        match value {
            crate::models::FetchMode::Newest => Self::Newest,
            crate::models::FetchMode::Random => Self::Random,
        }
    }
}

/// A bounded request to the catalog search engine.
#[derive(Debug, Clone)]
pub struct SelectQuery<'a> {
    pub term: &'a str,
    pub count: u32,
    pub mode: FetchMode,
    pub orientation: Orientation,
    pub exclude: &'a std::collections::HashSet<VideoId>,
    /// Bound on random-offset probe attempts as a multiple of `count`
    /// (§4.1 "≤ 3×count attempts"), configurable via
    /// `SchedulerConfig::random_sample_probe_multiplier`.
    pub probe_multiplier: u32,
}

/// Read-only view over the post catalog, external to the scheduler's own
/// persistence (§1, §4.1). Implemented by `PgCatalogStore` in production
/// and `FakeCatalogStore` in tests.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Count how many catalog posts match `term` under `orientation`,
    /// ignoring any exclusion set (used only for cache/estimation, not
    /// for selection correctness).
    async fn count(&self, term: &str, orientation: Orientation) -> Result<u64>;

    /// Select up to `query.count` matching, non-excluded records per the
    /// contract in SPEC_FULL §4.1 / spec.md §4.1.
    async fn select(&self, query: SelectQuery<'_>) -> Result<Vec<VideoRecord>>;
}

/// Postgres-backed catalog view, joining `video_posts` with `creators`.
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn split_term(term: &str) -> (Vec<String>, Vec<String>) {
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for word in term.split_whitespace() {
            if let Some(stripped) = word.strip_prefix('-') {
                if !stripped.is_empty() {
                    negative.push(stripped.to_lowercase());
                }
            } else {
                positive.push(word.to_lowercase());
            }
        }
        (positive, negative)
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<VideoRecord> {
        let video_id: String = row.try_get("video_id")?;
        let text: String = row.try_get("text")?;
        let posted_at: chrono::DateTime<chrono::Utc> = row.try_get("posted_at")?;
        let permalink: String = row.try_get("permalink")?;
        let width: i32 = row.try_get("width")?;
        let height: i32 = row.try_get("height")?;
        let source_url: String = row.try_get("source_url")?;
        let md_url: Option<String> = row.try_get("md_url")?;
        let thumbnail_url: Option<String> = row.try_get("thumbnail_url")?;
        let gif_url: Option<String> = row.try_get("gif_url")?;
        let creator_id: String = row.try_get("creator_id")?;
        let creator_username: String = row.try_get("creator_username")?;
        let creator_display_name: String = row.try_get("creator_display_name")?;

        Ok(VideoRecord {
            video_id: VideoId::from_string(video_id),
            creator: CreatorInfo {
                id: creator_id,
                username: creator_username,
                display_name: creator_display_name,
            },
            text,
            posted_at,
            permalink,
            width,
            height,
            encodings: MediaEncodings {
                source: source_url,
                md: md_url,
                thumbnail: thumbnail_url,
                gif: gif_url,
            },
        })
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn count(&self, term: &str, orientation: Orientation) -> Result<u64> {
        let (positive, negative) = Self::split_term(term);
        let orientation_clause = match orientation {
            Orientation::Mixed => "TRUE",
            Orientation::Wide => "width > height",
            Orientation::Tall => "height > width",
        };
        let sql = format!(
            r"
            SELECT COUNT(*) FROM video_posts
            WHERE {orientation_clause}
              AND lower(text) LIKE ANY($1)
              AND NOT (lower(text) LIKE ANY($2))
            "
        );
        let positive_patterns: Vec<String> = positive.iter().map(|w| format!("%{w}%")).collect();
        let negative_patterns: Vec<String> = negative.iter().map(|w| format!("%{w}%")).collect();
        let negative_patterns = if negative_patterns.is_empty() {
            vec!["\u{0}".to_string()]
        } else {
            negative_patterns
        };

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(&positive_patterns)
            .bind(&negative_patterns)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::CatalogUnavailable(e.to_string()))?;

        Ok(count.max(0) as u64)
    }

    async fn select(&self, query: SelectQuery<'_>) -> Result<Vec<VideoRecord>> {
        if query.term.trim().is_empty() {
            return Err(Error::InvalidArgument("search term must not be empty".to_string()));
        }

        let (positive, negative) = Self::split_term(query.term);
        let orientation_clause = match query.orientation {
            Orientation::Mixed => "TRUE",
            Orientation::Wide => "width > height",
            Orientation::Tall => "height > width",
        };
        let positive_patterns: Vec<String> = positive.iter().map(|w| format!("%{w}%")).collect();
        let negative_patterns: Vec<String> = negative.iter().map(|w| format!("%{w}%")).collect();
        let negative_patterns = if negative_patterns.is_empty() {
            vec!["\u{0}".to_string()]
        } else {
            negative_patterns
        };
        let excluded: Vec<String> = query.exclude.iter().map(|id| id.as_str().to_string()).collect();

        match query.mode {
            FetchMode::Newest => {
                let sql = format!(
                    r"
                    SELECT p.video_id, p.text, p.posted_at, p.permalink, p.width, p.height,
                           p.source_url, p.md_url, p.thumbnail_url, p.gif_url,
                           c.creator_id, c.username AS creator_username,
                           c.display_name AS creator_display_name
                    FROM video_posts p
                    JOIN creators c ON c.creator_id = p.creator_id
                    WHERE {orientation_clause}
                      AND lower(p.text) LIKE ANY($1)
                      AND NOT (lower(p.text) LIKE ANY($2))
                      AND NOT (p.video_id = ANY($3))
                    ORDER BY p.posted_at DESC, p.video_id ASC
                    LIMIT $4
                    "
                );
                let rows = sqlx::query(&sql)
                    .bind(&positive_patterns)
                    .bind(&negative_patterns)
                    .bind(&excluded)
                    .bind(i64::from(query.count))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| Error::CatalogUnavailable(e.to_string()))?;

                rows.iter().map(Self::row_to_record).collect()
            }
            FetchMode::Random => {
                // Bounded random-offset probing against the matching universe,
                // deduplicating by id (§4.1).
                let universe_sql = format!(
                    r"
                    SELECT COUNT(*) FROM video_posts p
                    WHERE {orientation_clause}
                      AND lower(p.text) LIKE ANY($1)
                      AND NOT (lower(p.text) LIKE ANY($2))
                      AND NOT (p.video_id = ANY($3))
                    "
                );
                let universe_size: i64 = sqlx::query_scalar(&universe_sql)
                    .bind(&positive_patterns)
                    .bind(&negative_patterns)
                    .bind(&excluded)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| Error::CatalogUnavailable(e.to_string()))?;

                if universe_size <= 0 {
                    return Ok(Vec::new());
                }

                let max_attempts = (query.count as usize)
                    .saturating_mul(query.probe_multiplier.max(1) as usize)
                    .max(1);
                let mut seen = std::collections::HashSet::new();
                let mut out = Vec::new();
                let mut rng = rand::thread_rng();
                use rand::Rng;

                for _ in 0..max_attempts {
                    if out.len() >= query.count as usize {
                        break;
                    }
                    let offset = rng.gen_range(0..universe_size);
                    let probe_sql = format!(
                        r"
                        SELECT p.video_id, p.text, p.posted_at, p.permalink, p.width, p.height,
                               p.source_url, p.md_url, p.thumbnail_url, p.gif_url,
                               c.creator_id, c.username AS creator_username,
                               c.display_name AS creator_display_name
                        FROM video_posts p
                        JOIN creators c ON c.creator_id = p.creator_id
                        WHERE {orientation_clause}
                          AND lower(p.text) LIKE ANY($1)
                          AND NOT (lower(p.text) LIKE ANY($2))
                          AND NOT (p.video_id = ANY($3))
                        ORDER BY p.video_id ASC
                        OFFSET $4 LIMIT 1
                        "
                    );
                    let row = sqlx::query(&probe_sql)
                        .bind(&positive_patterns)
                        .bind(&negative_patterns)
                        .bind(&excluded)
                        .bind(offset)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| Error::CatalogUnavailable(e.to_string()))?;

                    if let Some(row) = row {
                        let record = Self::row_to_record(&row)?;
                        if seen.insert(record.video_id.clone()) {
                            out.push(record);
                        }
                    }
                }

                Ok(out)
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::{CatalogStore, FetchMode, Orientation, SelectQuery, VideoRecord};
    use crate::{Error, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rand::seq::SliceRandom;

    /// In-memory catalog double for deterministic tests. `FromRow` parsing
    /// and SQL generation live only in `PgCatalogStore`; this fake matches
    /// the same selection contract directly against an in-memory `Vec`.
    pub struct FakeCatalogStore {
        records: Mutex<Vec<VideoRecord>>,
    }

    impl FakeCatalogStore {
        #[must_use]
        pub fn new(records: Vec<VideoRecord>) -> Self {
            Self {
                records: Mutex::new(records),
            }
        }

        fn matches(record: &VideoRecord, term: &str, orientation: Orientation) -> bool {
            let (positive, negative) = split_term(term);
            let text = record.text.to_lowercase();
            let positive_ok = positive.iter().all(|w| text.contains(w.as_str()));
            let negative_ok = !negative.iter().any(|w| text.contains(w.as_str()));
            positive_ok && negative_ok && orientation.matches(record.width, record.height)
        }
    }

    fn split_term(term: &str) -> (Vec<String>, Vec<String>) {
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for word in term.split_whitespace() {
            if let Some(stripped) = word.strip_prefix('-') {
                if !stripped.is_empty() {
                    negative.push(stripped.to_lowercase());
                }
            } else {
                positive.push(word.to_lowercase());
            }
        }
        (positive, negative)
    }

    #[async_trait]
    impl CatalogStore for FakeCatalogStore {
        async fn count(&self, term: &str, orientation: Orientation) -> Result<u64> {
            let records = self.records.lock();
            Ok(records
                .iter()
                .filter(|r| Self::matches(r, term, orientation))
                .count() as u64)
        }

        async fn select(&self, query: SelectQuery<'_>) -> Result<Vec<VideoRecord>> {
            if query.term.trim().is_empty() {
                return Err(Error::InvalidArgument("search term must not be empty".to_string()));
            }

            let records = self.records.lock();
            let mut matching: Vec<&VideoRecord> = records
                .iter()
                .filter(|r| {
                    Self::matches(r, query.term, query.orientation) && !query.exclude.contains(&r.video_id)
                })
                .collect();

            match query.mode {
                FetchMode::Newest => {
                    matching.sort_by(|a, b| {
                        b.posted_at
                            .cmp(&a.posted_at)
                            .then_with(|| a.video_id.cmp(&b.video_id))
                    });
                    Ok(matching
                        .into_iter()
                        .take(query.count as usize)
                        .cloned()
                        .collect())
                }
                FetchMode::Random => {
                    let mut rng = rand::thread_rng();
                    matching.shuffle(&mut rng);
                    Ok(matching
                        .into_iter()
                        .take(query.count as usize)
                        .cloned()
                        .collect())
                }
            }
        }
    }

    #[tokio::test]
    async fn newest_mode_is_deterministic_and_excludes() {
        use crate::models::{CreatorInfo, MediaEncodings, VideoId};
        use chrono::{TimeZone, Utc};

        let mk = |id: &str, ts: i64| VideoRecord {
            video_id: VideoId::from_string(id.to_string()),
            creator: CreatorInfo {
                id: "c1".into(),
                username: "c1".into(),
                display_name: "Creator".into(),
            },
            text: "a sunset video".into(),
            posted_at: Utc.timestamp_opt(ts, 0).unwrap(),
            permalink: format!("https://example/{id}"),
            width: 100,
            height: 50,
            encodings: MediaEncodings {
                source: "https://example/src".into(),
                md: None,
                thumbnail: None,
                gif: None,
            },
        };

        let store = FakeCatalogStore::new(vec![mk("v1", 1), mk("v2", 2), mk("v3", 3)]);
        let exclude = std::collections::HashSet::new();
        let result = store
            .select(SelectQuery {
                term: "sunset",
                count: 2,
                mode: FetchMode::Newest,
                orientation: Orientation::Mixed,
                exclude: &exclude,
                probe_multiplier: 3,
            })
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].video_id.as_str(), "v3");
        assert_eq!(result[1].video_id.as_str(), "v2");
    }
}
