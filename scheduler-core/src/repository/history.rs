//! History repository (§3 History Entry). Append-only, never pruned by
//! the engine (SPEC_FULL REDESIGN FLAGS: unbounded retention).

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::models::{BlockId, DisplayId, HistoryEntry, HistoryEntryId, VideoId};
use crate::Result;

/// Storage interface for history entries, behind a trait so the service
/// layer can be exercised against an in-memory fake in tests (SPEC_FULL
/// §9.4).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(
        &self,
        display_id: &DisplayId,
        video_id: &VideoId,
        block_id: &BlockId,
        loop_iteration: i64,
        played_at: DateTime<Utc>,
    ) -> Result<HistoryEntry>;
    /// All video ids previously played for a (display, block) pair, used
    /// to build the catalog search's exclusion set so a block does not
    /// repeat a video across loops (§4.1 exclude set, §4.3.4).
    async fn played_video_ids(&self, display_id: &DisplayId, block_id: &BlockId) -> Result<HashSet<VideoId>>;
    async fn list_for_display(&self, display_id: &DisplayId, limit: i64) -> Result<Vec<HistoryEntry>>;
}

#[derive(Clone)]
pub struct PgHistoryRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct HistoryRow {
    history_id: String,
    display_id: String,
    video_id: String,
    block_id: String,
    loop_iteration: i64,
    played_at: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            history_id: HistoryEntryId::from_string(row.history_id),
            display_id: DisplayId::from_string(row.display_id),
            video_id: VideoId::from_string(row.video_id),
            block_id: BlockId::from_string(row.block_id),
            loop_iteration: row.loop_iteration,
            played_at: row.played_at,
        }
    }
}

impl PgHistoryRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryRepository {
    async fn record(
        &self,
        display_id: &DisplayId,
        video_id: &VideoId,
        block_id: &BlockId,
        loop_iteration: i64,
        played_at: DateTime<Utc>,
    ) -> Result<HistoryEntry> {
        let id = HistoryEntryId::new();
        sqlx::query(
            r"
            INSERT INTO video_history (history_id, display_id, video_id, block_id, loop_iteration, played_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(id.as_str())
        .bind(display_id.as_str())
        .bind(video_id.as_str())
        .bind(block_id.as_str())
        .bind(loop_iteration)
        .bind(played_at)
        .execute(&self.pool)
        .await?;

        Ok(HistoryEntry {
            history_id: id,
            display_id: display_id.clone(),
            video_id: video_id.clone(),
            block_id: block_id.clone(),
            loop_iteration,
            played_at,
        })
    }

    async fn played_video_ids(&self, display_id: &DisplayId, block_id: &BlockId) -> Result<HashSet<VideoId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT video_id FROM video_history WHERE display_id = $1 AND block_id = $2",
        )
        .bind(display_id.as_str())
        .bind(block_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(VideoId::from_string).collect())
    }

    async fn list_for_display(&self, display_id: &DisplayId, limit: i64) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT history_id, display_id, video_id, block_id, loop_iteration, played_at
            FROM video_history WHERE display_id = $1
            ORDER BY played_at DESC
            LIMIT $2
            ",
        )
        .bind(display_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::{BlockId, DisplayId, HashSet, HistoryEntry, HistoryEntryId, HistoryStore, VideoId};
    use crate::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeHistoryStore {
        rows: Mutex<Vec<HistoryEntry>>,
    }

    impl FakeHistoryStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl HistoryStore for FakeHistoryStore {
        async fn record(
            &self,
            display_id: &DisplayId,
            video_id: &VideoId,
            block_id: &BlockId,
            loop_iteration: i64,
            played_at: DateTime<Utc>,
        ) -> Result<HistoryEntry> {
            let entry = HistoryEntry {
                history_id: HistoryEntryId::new(),
                display_id: display_id.clone(),
                video_id: video_id.clone(),
                block_id: block_id.clone(),
                loop_iteration,
                played_at,
            };
            self.rows.lock().push(entry.clone());
            Ok(entry)
        }

        async fn played_video_ids(&self, display_id: &DisplayId, block_id: &BlockId) -> Result<HashSet<VideoId>> {
            Ok(self
                .rows
                .lock()
                .iter()
                .filter(|e| &e.display_id == display_id && &e.block_id == block_id)
                .map(|e| e.video_id.clone())
                .collect())
        }

        async fn list_for_display(&self, display_id: &DisplayId, limit: i64) -> Result<Vec<HistoryEntry>> {
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .iter()
                .filter(|e| &e.display_id == display_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.played_at.cmp(&a.played_at));
            rows.truncate(limit.max(0) as usize);
            Ok(rows)
        }
    }
}
