//! Playlist repository (§3 Playlist, §4.2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::models::{DisplayId, Playlist, PlaylistId};
use crate::Result;

/// Storage interface for playlists, behind a trait so the service layer
/// can be exercised against an in-memory fake in tests (SPEC_FULL §9.4).
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    async fn create(
        &self,
        display_id: &DisplayId,
        name: &str,
        total_blocks: i32,
        total_videos: i32,
        now: DateTime<Utc>,
    ) -> Result<Playlist>;
    async fn get(&self, id: &PlaylistId) -> Result<Option<Playlist>>;
    async fn get_active_for_display(&self, display_id: &DisplayId) -> Result<Option<Playlist>>;
    async fn list_for_display(&self, display_id: &DisplayId) -> Result<Vec<Playlist>>;
    async fn rename(&self, id: &PlaylistId, name: &str, now: DateTime<Utc>) -> Result<()>;
    async fn delete(&self, id: &PlaylistId) -> Result<bool>;
    /// Atomically clears any prior active playlist for `display_id` and
    /// activates `playlist_id` (§4.2 `activate_playlist`).
    async fn activate(&self, display_id: &DisplayId, playlist_id: &PlaylistId, now: DateTime<Utc>) -> Result<()>;
    async fn increment_loop_count(&self, id: &PlaylistId) -> Result<i64>;
}

#[derive(Clone)]
pub struct PgPlaylistRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct PlaylistRow {
    id: String,
    display_id: String,
    name: String,
    is_active: bool,
    total_blocks: i32,
    total_videos: i32,
    loop_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlaylistRow> for Playlist {
    fn from(row: PlaylistRow) -> Self {
        Self {
            id: PlaylistId::from_string(row.id),
            display_id: DisplayId::from_string(row.display_id),
            name: row.name,
            is_active: row.is_active,
            total_blocks: row.total_blocks,
            total_videos: row.total_videos,
            loop_count: row.loop_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PgPlaylistRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn get_inner(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        let row = sqlx::query_as::<_, PlaylistRow>(
            r"
            SELECT id, display_id, name, is_active, total_blocks, total_videos,
                   loop_count, created_at, updated_at
            FROM playlists WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl PlaylistStore for PgPlaylistRepository {
    async fn create(
        &self,
        display_id: &DisplayId,
        name: &str,
        total_blocks: i32,
        total_videos: i32,
        now: DateTime<Utc>,
    ) -> Result<Playlist> {
        let id = PlaylistId::new();
        sqlx::query(
            r"
            INSERT INTO playlists (id, display_id, name, is_active, total_blocks, total_videos,
                                   loop_count, created_at, updated_at)
            VALUES ($1, $2, $3, FALSE, $4, $5, 0, $6, $6)
            ",
        )
        .bind(id.as_str())
        .bind(display_id.as_str())
        .bind(name)
        .bind(total_blocks)
        .bind(total_videos)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_inner(&id).await?.ok_or_else(|| {
            crate::Error::Fatal("playlist vanished immediately after insert".to_string())
        })
    }

    async fn get(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        self.get_inner(id).await
    }

    async fn get_active_for_display(&self, display_id: &DisplayId) -> Result<Option<Playlist>> {
        let row = sqlx::query_as::<_, PlaylistRow>(
            r"
            SELECT id, display_id, name, is_active, total_blocks, total_videos,
                   loop_count, created_at, updated_at
            FROM playlists WHERE display_id = $1 AND is_active = TRUE
            ",
        )
        .bind(display_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_for_display(&self, display_id: &DisplayId) -> Result<Vec<Playlist>> {
        let rows = sqlx::query_as::<_, PlaylistRow>(
            r"
            SELECT id, display_id, name, is_active, total_blocks, total_videos,
                   loop_count, created_at, updated_at
            FROM playlists WHERE display_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(display_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn rename(&self, id: &PlaylistId, name: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE playlists SET name = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(name)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &PlaylistId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Caller is expected to wrap this with the display's
    /// `set_active_playlist` in the same logical operation.
    async fn activate(&self, display_id: &DisplayId, playlist_id: &PlaylistId, now: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE playlists SET is_active = FALSE, updated_at = $2 WHERE display_id = $1 AND is_active = TRUE")
            .bind(display_id.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE playlists SET is_active = TRUE, updated_at = $2 WHERE id = $1")
            .bind(playlist_id.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn increment_loop_count(&self, id: &PlaylistId) -> Result<i64> {
        let loop_count: i64 = sqlx::query_scalar(
            "UPDATE playlists SET loop_count = loop_count + 1 WHERE id = $1 RETURNING loop_count",
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(loop_count)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::{DisplayId, Playlist, PlaylistId, PlaylistStore};
    use crate::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakePlaylistStore {
        rows: Mutex<HashMap<PlaylistId, Playlist>>,
    }

    impl FakePlaylistStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PlaylistStore for FakePlaylistStore {
        async fn create(
            &self,
            display_id: &DisplayId,
            name: &str,
            total_blocks: i32,
            total_videos: i32,
            now: DateTime<Utc>,
        ) -> Result<Playlist> {
            let playlist = Playlist {
                id: PlaylistId::new(),
                display_id: display_id.clone(),
                name: name.to_string(),
                is_active: false,
                total_blocks,
                total_videos,
                loop_count: 0,
                created_at: now,
                updated_at: now,
            };
            self.rows.lock().insert(playlist.id.clone(), playlist.clone());
            Ok(playlist)
        }

        async fn get(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
            Ok(self.rows.lock().get(id).cloned())
        }

        async fn get_active_for_display(&self, display_id: &DisplayId) -> Result<Option<Playlist>> {
            Ok(self
                .rows
                .lock()
                .values()
                .find(|p| &p.display_id == display_id && p.is_active)
                .cloned())
        }

        async fn list_for_display(&self, display_id: &DisplayId) -> Result<Vec<Playlist>> {
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .values()
                .filter(|p| &p.display_id == display_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(rows)
        }

        async fn rename(&self, id: &PlaylistId, name: &str, now: DateTime<Utc>) -> Result<()> {
            let mut rows = self.rows.lock();
            if let Some(playlist) = rows.get_mut(id) {
                playlist.name = name.to_string();
                playlist.updated_at = now;
            }
            Ok(())
        }

        async fn delete(&self, id: &PlaylistId) -> Result<bool> {
            Ok(self.rows.lock().remove(id).is_some())
        }

        async fn activate(&self, display_id: &DisplayId, playlist_id: &PlaylistId, now: DateTime<Utc>) -> Result<()> {
            let mut rows = self.rows.lock();
            for playlist in rows.values_mut() {
                if &playlist.display_id == display_id && playlist.is_active {
                    playlist.is_active = false;
                    playlist.updated_at = now;
                }
            }
            if let Some(playlist) = rows.get_mut(playlist_id) {
                playlist.is_active = true;
                playlist.updated_at = now;
            }
            Ok(())
        }

        async fn increment_loop_count(&self, id: &PlaylistId) -> Result<i64> {
            let mut rows = self.rows.lock();
            let playlist = rows
                .get_mut(id)
                .ok_or_else(|| crate::Error::NotFound(format!("playlist {id} not found")))?;
            playlist.loop_count += 1;
            Ok(playlist.loop_count)
        }
    }
}
