//! Timeline repository (§3 Timeline Entry, §4.3 Timeline Engine).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::models::{
    BlockId, DisplayId, PlaylistId, TimelineEntry, TimelineEntryId, TimelineStatus, VideoId,
    VideoPayload,
};
use crate::Result;

/// One entry to be inserted by `populate` (§4.3.1), position fields
/// assigned by the caller.
#[derive(Debug, Clone)]
pub struct NewTimelineEntry {
    pub block_id: BlockId,
    pub video_id: VideoId,
    pub block_position: i32,
    pub timeline_position: i64,
    pub loop_iteration: i64,
    pub video_payload: VideoPayload,
}

/// Storage interface for timeline entries, behind a trait so the service
/// layer can be exercised against an in-memory fake in tests (SPEC_FULL
/// §9.4).
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Insert a full batch of queued entries for a display/playlist
    /// (§4.3.1 `populate`: contiguous positions, all queued).
    async fn populate(
        &self,
        display_id: &DisplayId,
        playlist_id: &PlaylistId,
        entries: &[NewTimelineEntry],
    ) -> Result<()>;
    /// The queued entry at or after `from_position` with the smallest
    /// `timeline_position` for a display (§4.3.2 `next_for_display`).
    async fn next_queued(&self, display_id: &DisplayId, from_position: i64) -> Result<Option<TimelineEntry>>;
    async fn get(&self, entry_id: &TimelineEntryId) -> Result<Option<TimelineEntry>>;
    /// Transition a queued entry to played, idempotently: a second call on
    /// an already-played entry is a no-op success (§4.3.3 invariant:
    /// one-way `queued` → `played`). Returns whether a transition occurred.
    async fn mark_played(&self, entry_id: &TimelineEntryId, now: DateTime<Utc>) -> Result<bool>;
    /// True when every entry for a display's current playlist has been
    /// played, i.e. a rollover is due (§4.3.4).
    async fn all_played(&self, display_id: &DisplayId, playlist_id: &PlaylistId) -> Result<bool>;
    /// Delete the highest-`timeline_position` queued entries for a block
    /// down to `target_count`, used by `reset_blocks_to_target` (§4.3.5).
    /// Never adds entries.
    async fn trim_block_to_target(&self, display_id: &DisplayId, block_id: &BlockId, target_count: i64) -> Result<u64>;
    /// Remove all entries for a display's playlist, used right before a
    /// rollover re-population (§4.3.4).
    async fn clear_for_playlist(&self, display_id: &DisplayId, playlist_id: &PlaylistId) -> Result<()>;
    /// Ordered queued entries for an operator preview (§6
    /// `GET /displays/{id}/queue?limit=N`).
    async fn preview_queue(&self, display_id: &DisplayId, limit: i64) -> Result<Vec<TimelineEntry>>;
}

#[derive(Clone)]
pub struct PgTimelineRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct TimelineRow {
    entry_id: String,
    display_id: String,
    playlist_id: String,
    block_id: String,
    video_id: String,
    block_position: i32,
    timeline_position: i64,
    loop_iteration: i64,
    status: String,
    played_at: Option<DateTime<Utc>>,
    video_payload: serde_json::Value,
}

impl TimelineRow {
    fn into_entry(self) -> Result<TimelineEntry> {
        let video_payload: VideoPayload = serde_json::from_value(self.video_payload)?;
        Ok(TimelineEntry {
            entry_id: TimelineEntryId::from_string(self.entry_id),
            display_id: DisplayId::from_string(self.display_id),
            playlist_id: PlaylistId::from_string(self.playlist_id),
            block_id: BlockId::from_string(self.block_id),
            video_id: VideoId::from_string(self.video_id),
            block_position: self.block_position,
            timeline_position: self.timeline_position,
            loop_iteration: self.loop_iteration,
            status: match self.status.as_str() {
                "played" => TimelineStatus::Played,
                _ => TimelineStatus::Queued,
            },
            played_at: self.played_at,
            video_payload,
        })
    }
}

impl PgTimelineRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimelineStore for PgTimelineRepository {
    async fn populate(
        &self,
        display_id: &DisplayId,
        playlist_id: &PlaylistId,
        entries: &[NewTimelineEntry],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            let id = TimelineEntryId::new();
            let payload = serde_json::to_value(&entry.video_payload)?;
            sqlx::query(
                r"
                INSERT INTO timeline_videos
                    (entry_id, display_id, playlist_id, block_id, video_id, block_position,
                     timeline_position, loop_iteration, status, played_at, video_payload)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'queued', NULL, $9)
                ",
            )
            .bind(id.as_str())
            .bind(display_id.as_str())
            .bind(playlist_id.as_str())
            .bind(entry.block_id.as_str())
            .bind(entry.video_id.as_str())
            .bind(entry.block_position)
            .bind(entry.timeline_position)
            .bind(entry.loop_iteration)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn next_queued(&self, display_id: &DisplayId, from_position: i64) -> Result<Option<TimelineEntry>> {
        let row = sqlx::query_as::<_, TimelineRow>(
            r"
            SELECT entry_id, display_id, playlist_id, block_id, video_id, block_position,
                   timeline_position, loop_iteration, status, played_at, video_payload
            FROM timeline_videos
            WHERE display_id = $1 AND status = 'queued' AND timeline_position >= $2
            ORDER BY timeline_position ASC
            LIMIT 1
            ",
        )
        .bind(display_id.as_str())
        .bind(from_position)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TimelineRow::into_entry).transpose()
    }

    async fn get(&self, entry_id: &TimelineEntryId) -> Result<Option<TimelineEntry>> {
        let row = sqlx::query_as::<_, TimelineRow>(
            r"
            SELECT entry_id, display_id, playlist_id, block_id, video_id, block_position,
                   timeline_position, loop_iteration, status, played_at, video_payload
            FROM timeline_videos WHERE entry_id = $1
            ",
        )
        .bind(entry_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TimelineRow::into_entry).transpose()
    }

    async fn mark_played(&self, entry_id: &TimelineEntryId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE timeline_videos SET status = 'played', played_at = $2 WHERE entry_id = $1 AND status = 'queued'",
        )
        .bind(entry_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn all_played(&self, display_id: &DisplayId, playlist_id: &PlaylistId) -> Result<bool> {
        let remaining: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM timeline_videos WHERE display_id = $1 AND playlist_id = $2 AND status = 'queued'",
        )
        .bind(display_id.as_str())
        .bind(playlist_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(remaining == 0)
    }

    async fn trim_block_to_target(&self, display_id: &DisplayId, block_id: &BlockId, target_count: i64) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM timeline_videos
            WHERE entry_id IN (
                SELECT entry_id FROM timeline_videos
                WHERE display_id = $1 AND block_id = $2 AND status = 'queued'
                ORDER BY timeline_position ASC
                OFFSET $3
            )
            ",
        )
        .bind(display_id.as_str())
        .bind(block_id.as_str())
        .bind(target_count)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn clear_for_playlist(&self, display_id: &DisplayId, playlist_id: &PlaylistId) -> Result<()> {
        sqlx::query("DELETE FROM timeline_videos WHERE display_id = $1 AND playlist_id = $2")
            .bind(display_id.as_str())
            .bind(playlist_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn preview_queue(&self, display_id: &DisplayId, limit: i64) -> Result<Vec<TimelineEntry>> {
        let rows = sqlx::query_as::<_, TimelineRow>(
            r"
            SELECT entry_id, display_id, playlist_id, block_id, video_id, block_position,
                   timeline_position, loop_iteration, status, played_at, video_payload
            FROM timeline_videos
            WHERE display_id = $1 AND status = 'queued'
            ORDER BY timeline_position ASC
            LIMIT $2
            ",
        )
        .bind(display_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TimelineRow::into_entry).collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::{
        BlockId, DisplayId, NewTimelineEntry, PlaylistId, TimelineEntry, TimelineEntryId,
        TimelineStatus, TimelineStore,
    };
    use crate::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeTimelineStore {
        rows: Mutex<Vec<TimelineEntry>>,
    }

    impl FakeTimelineStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl TimelineStore for FakeTimelineStore {
        async fn populate(
            &self,
            display_id: &DisplayId,
            playlist_id: &PlaylistId,
            entries: &[NewTimelineEntry],
        ) -> Result<()> {
            let mut rows = self.rows.lock();
            for entry in entries {
                rows.push(TimelineEntry {
                    entry_id: TimelineEntryId::new(),
                    display_id: display_id.clone(),
                    playlist_id: playlist_id.clone(),
                    block_id: entry.block_id.clone(),
                    video_id: entry.video_id.clone(),
                    block_position: entry.block_position,
                    timeline_position: entry.timeline_position,
                    loop_iteration: entry.loop_iteration,
                    status: TimelineStatus::Queued,
                    played_at: None,
                    video_payload: entry.video_payload.clone(),
                });
            }
            Ok(())
        }

        async fn next_queued(&self, display_id: &DisplayId, from_position: i64) -> Result<Option<TimelineEntry>> {
            Ok(self
                .rows
                .lock()
                .iter()
                .filter(|e| {
                    &e.display_id == display_id
                        && e.status == TimelineStatus::Queued
                        && e.timeline_position >= from_position
                })
                .min_by_key(|e| e.timeline_position)
                .cloned())
        }

        async fn get(&self, entry_id: &TimelineEntryId) -> Result<Option<TimelineEntry>> {
            Ok(self.rows.lock().iter().find(|e| &e.entry_id == entry_id).cloned())
        }

        async fn mark_played(&self, entry_id: &TimelineEntryId, now: DateTime<Utc>) -> Result<bool> {
            let mut rows = self.rows.lock();
            if let Some(entry) = rows.iter_mut().find(|e| &e.entry_id == entry_id) {
                if entry.status == TimelineStatus::Queued {
                    entry.status = TimelineStatus::Played;
                    entry.played_at = Some(now);
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn all_played(&self, display_id: &DisplayId, playlist_id: &PlaylistId) -> Result<bool> {
            Ok(!self
                .rows
                .lock()
                .iter()
                .any(|e| &e.display_id == display_id && &e.playlist_id == playlist_id && e.status == TimelineStatus::Queued))
        }

        async fn trim_block_to_target(&self, display_id: &DisplayId, block_id: &BlockId, target_count: i64) -> Result<u64> {
            let mut rows = self.rows.lock();
            let mut matching: Vec<usize> = rows
                .iter()
                .enumerate()
                .filter(|(_, e)| &e.display_id == display_id && &e.block_id == block_id && e.status == TimelineStatus::Queued)
                .map(|(i, _)| i)
                .collect();
            matching.sort_by_key(|&i| rows[i].timeline_position);

            let target = target_count.max(0) as usize;
            let to_remove: Vec<usize> = matching.into_iter().skip(target).collect();
            let removed = to_remove.len() as u64;
            let mut to_remove: Vec<usize> = to_remove;
            to_remove.sort_unstable_by(|a, b| b.cmp(a));
            for idx in to_remove {
                rows.remove(idx);
            }
            Ok(removed)
        }

        async fn clear_for_playlist(&self, display_id: &DisplayId, playlist_id: &PlaylistId) -> Result<()> {
            self.rows
                .lock()
                .retain(|e| !(&e.display_id == display_id && &e.playlist_id == playlist_id));
            Ok(())
        }

        async fn preview_queue(&self, display_id: &DisplayId, limit: i64) -> Result<Vec<TimelineEntry>> {
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .iter()
                .filter(|e| &e.display_id == display_id && e.status == TimelineStatus::Queued)
                .cloned()
                .collect();
            rows.sort_by_key(|e| e.timeline_position);
            rows.truncate(limit.max(0) as usize);
            Ok(rows)
        }
    }
}
