//! Block repository (§3 Block, §4.3.5 `reset_blocks_to_target`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::models::{Block, BlockId, FetchMode, Orientation, PlaylistId};
use crate::Result;

/// Storage interface for playlist blocks, behind a trait so the service
/// layer can be exercised against an in-memory fake in tests (SPEC_FULL
/// §9.4).
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Insert a playlist's blocks, assigning dense `block_order`
    /// positions `0..len` in the given order (§3 invariant: `block_order`
    /// is a dense permutation).
    async fn create_many(
        &self,
        playlist_id: &PlaylistId,
        specs: &[(String, i32, FetchMode, Orientation)],
    ) -> Result<Vec<Block>>;
    async fn get(&self, id: &BlockId) -> Result<Option<Block>>;
    /// Ordered blocks of a playlist, by `block_order` ascending (§3).
    async fn list_for_playlist(&self, playlist_id: &PlaylistId) -> Result<Vec<Block>>;
    async fn record_played(&self, id: &BlockId, now: DateTime<Utc>) -> Result<()>;
    async fn set_video_count(&self, id: &BlockId, video_count: i32) -> Result<()>;
}

#[derive(Clone)]
pub struct PgBlockRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct BlockRow {
    id: String,
    playlist_id: String,
    search_term: String,
    video_count: i32,
    fetch_mode: String,
    orientation: String,
    block_order: i32,
    times_played: i64,
    last_played_at: Option<DateTime<Utc>>,
}

impl From<BlockRow> for Block {
    fn from(row: BlockRow) -> Self {
        Self {
            id: BlockId::from_string(row.id),
            playlist_id: PlaylistId::from_string(row.playlist_id),
            search_term: row.search_term,
            video_count: row.video_count,
            fetch_mode: match row.fetch_mode.as_str() {
                "random" => FetchMode::Random,
                _ => FetchMode::Newest,
            },
            orientation: match row.orientation.as_str() {
                "wide" => Orientation::Wide,
                "tall" => Orientation::Tall,
                _ => Orientation::Mixed,
            },
            block_order: row.block_order,
            times_played: row.times_played,
            last_played_at: row.last_played_at,
        }
    }
}

impl PgBlockRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlockStore for PgBlockRepository {
    async fn create_many(
        &self,
        playlist_id: &PlaylistId,
        specs: &[(String, i32, FetchMode, Orientation)],
    ) -> Result<Vec<Block>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(specs.len());
        for (order, (term, count, mode, orientation)) in specs.iter().enumerate() {
            let id = BlockId::new();
            sqlx::query(
                r"
                INSERT INTO playlist_blocks
                    (id, playlist_id, search_term, video_count, fetch_mode, orientation,
                     block_order, times_played)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
                ",
            )
            .bind(id.as_str())
            .bind(playlist_id.as_str())
            .bind(term)
            .bind(count)
            .bind(mode.as_str())
            .bind(orientation.as_str())
            .bind(i32::try_from(order).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }
        tx.commit().await?;

        let mut blocks = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(block) = self.get(id).await? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    async fn get(&self, id: &BlockId) -> Result<Option<Block>> {
        let row = sqlx::query_as::<_, BlockRow>(
            r"
            SELECT id, playlist_id, search_term, video_count, fetch_mode, orientation,
                   block_order, times_played, last_played_at
            FROM playlist_blocks WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_for_playlist(&self, playlist_id: &PlaylistId) -> Result<Vec<Block>> {
        let rows = sqlx::query_as::<_, BlockRow>(
            r"
            SELECT id, playlist_id, search_term, video_count, fetch_mode, orientation,
                   block_order, times_played, last_played_at
            FROM playlist_blocks WHERE playlist_id = $1
            ORDER BY block_order ASC
            ",
        )
        .bind(playlist_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_played(&self, id: &BlockId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE playlist_blocks SET times_played = times_played + 1, last_played_at = $2 WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Adjust a block's `video_count` target, used by
    /// `reset_blocks_to_target` (§4.3.5) when an operator edits a block's
    /// size between loops; the timeline engine re-populates on the next
    /// rollover rather than retroactively.
    async fn set_video_count(&self, id: &BlockId, video_count: i32) -> Result<()> {
        sqlx::query("UPDATE playlist_blocks SET video_count = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(video_count)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::{Block, BlockId, BlockStore, FetchMode, Orientation, PlaylistId};
    use crate::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeBlockStore {
        rows: Mutex<HashMap<BlockId, Block>>,
    }

    impl FakeBlockStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl BlockStore for FakeBlockStore {
        async fn create_many(
            &self,
            playlist_id: &PlaylistId,
            specs: &[(String, i32, FetchMode, Orientation)],
        ) -> Result<Vec<Block>> {
            let mut rows = self.rows.lock();
            let mut created = Vec::with_capacity(specs.len());
            for (order, (term, count, mode, orientation)) in specs.iter().enumerate() {
                let block = Block {
                    id: BlockId::new(),
                    playlist_id: playlist_id.clone(),
                    search_term: term.clone(),
                    video_count: *count,
                    fetch_mode: *mode,
                    orientation: *orientation,
                    block_order: i32::try_from(order).unwrap_or(i32::MAX),
                    times_played: 0,
                    last_played_at: None,
                };
                rows.insert(block.id.clone(), block.clone());
                created.push(block);
            }
            Ok(created)
        }

        async fn get(&self, id: &BlockId) -> Result<Option<Block>> {
            Ok(self.rows.lock().get(id).cloned())
        }

        async fn list_for_playlist(&self, playlist_id: &PlaylistId) -> Result<Vec<Block>> {
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .values()
                .filter(|b| &b.playlist_id == playlist_id)
                .cloned()
                .collect();
            rows.sort_by_key(|b| b.block_order);
            Ok(rows)
        }

        async fn record_played(&self, id: &BlockId, now: DateTime<Utc>) -> Result<()> {
            let mut rows = self.rows.lock();
            if let Some(block) = rows.get_mut(id) {
                block.times_played += 1;
                block.last_played_at = Some(now);
            }
            Ok(())
        }

        async fn set_video_count(&self, id: &BlockId, video_count: i32) -> Result<()> {
            let mut rows = self.rows.lock();
            if let Some(block) = rows.get_mut(id) {
                block.video_count = video_count;
            }
            Ok(())
        }
    }
}
