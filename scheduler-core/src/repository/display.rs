//! Display repository (§3 Display, part of the Scheduling Store C2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::models::{Display, DisplayId, Liveness, PlaylistId, VideoId};
use crate::Result;

/// Storage interface for displays, behind a trait so the service layer
/// can be exercised against an in-memory fake in tests (SPEC_FULL §9.4),
/// mirroring the `CatalogStore` trait/impl split.
#[async_trait]
pub trait DisplayStore: Send + Sync {
    async fn create(&self, name: String, now: DateTime<Utc>) -> Result<Display>;
    async fn get(&self, id: &DisplayId) -> Result<Option<Display>>;
    async fn list(&self) -> Result<Vec<Display>>;
    async fn delete(&self, id: &DisplayId) -> Result<bool>;
    async fn apply_poll_report(
        &self,
        id: &DisplayId,
        liveness: Liveness,
        current_video_id: Option<&VideoId>,
        now: DateTime<Utc>,
    ) -> Result<()>;
    async fn set_active_playlist(&self, id: &DisplayId, playlist_id: &PlaylistId) -> Result<()>;
    async fn clear_active_playlist(&self, id: &DisplayId) -> Result<()>;
    async fn set_timeline_position(&self, id: &DisplayId, position: i64) -> Result<()>;
}

#[derive(Clone)]
pub struct PgDisplayRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct DisplayRow {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    last_ping: Option<DateTime<Utc>>,
    liveness: String,
    current_video_id: Option<String>,
    current_playlist_id: Option<String>,
    timeline_position: i64,
    last_state_change: DateTime<Utc>,
}

impl From<DisplayRow> for Display {
    fn from(row: DisplayRow) -> Self {
        Self {
            id: DisplayId::from_string(row.id),
            name: row.name,
            created_at: row.created_at,
            last_ping: row.last_ping,
            liveness: Liveness::clamp(&row.liveness),
            current_video_id: row.current_video_id.map(VideoId::from_string),
            current_playlist_id: row.current_playlist_id.map(PlaylistId::from_string),
            timeline_position: row.timeline_position,
            last_state_change: row.last_state_change,
        }
    }
}

impl PgDisplayRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DisplayStore for PgDisplayRepository {
    /// Insert a newly-provisioned display, retrying on pairing-code
    /// collision since uniqueness can only be checked against the store
    /// (§6 "retried on collision").
    async fn create(&self, name: String, now: DateTime<Utc>) -> Result<Display> {
        loop {
            let display = Display::new(name.clone(), now);
            let result = sqlx::query(
                r"
                INSERT INTO displays (id, name, created_at, liveness, timeline_position, last_state_change)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(display.id.as_str())
            .bind(&display.name)
            .bind(display.created_at)
            .bind(display.liveness.as_str())
            .bind(display.timeline_position)
            .bind(display.last_state_change)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => return Ok(display),
                Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn get(&self, id: &DisplayId) -> Result<Option<Display>> {
        let row = sqlx::query_as::<_, DisplayRow>(
            r"
            SELECT id, name, created_at, last_ping, liveness, current_video_id,
                   current_playlist_id, timeline_position, last_state_change
            FROM displays WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<Display>> {
        let rows = sqlx::query_as::<_, DisplayRow>(
            r"
            SELECT id, name, created_at, last_ping, liveness, current_video_id,
                   current_playlist_id, timeline_position, last_state_change
            FROM displays ORDER BY created_at ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: &DisplayId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM displays WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update reported liveness/playback state from a poll (§4.4 step 2).
    /// `last_state_change` only moves when `liveness` actually changed.
    async fn apply_poll_report(
        &self,
        id: &DisplayId,
        liveness: Liveness,
        current_video_id: Option<&VideoId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE displays
            SET last_ping = $2,
                liveness = $3,
                current_video_id = $4,
                last_state_change = CASE WHEN liveness IS DISTINCT FROM $3 THEN $2 ELSE last_state_change END
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .bind(now)
        .bind(liveness.as_str())
        .bind(current_video_id.map(VideoId::as_str))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Activate a playlist and reset the timeline cursor (§4.2 `activate_playlist`).
    async fn set_active_playlist(&self, id: &DisplayId, playlist_id: &PlaylistId) -> Result<()> {
        sqlx::query(
            "UPDATE displays SET current_playlist_id = $2, timeline_position = 0 WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(playlist_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear the active-playlist pointer (used when a playlist is deleted, §4.2).
    async fn clear_active_playlist(&self, id: &DisplayId) -> Result<()> {
        sqlx::query("UPDATE displays SET current_playlist_id = NULL, timeline_position = 0 WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Advance the stored cursor to `position` (§4.3.3 step 2).
    async fn set_timeline_position(&self, id: &DisplayId, position: i64) -> Result<()> {
        sqlx::query("UPDATE displays SET timeline_position = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(position)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::{Display, DisplayId, DisplayStore, Liveness, PlaylistId, VideoId};
    use crate::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory `DisplayStore` double for deterministic tests.
    #[derive(Default)]
    pub struct FakeDisplayStore {
        rows: Mutex<HashMap<DisplayId, Display>>,
    }

    impl FakeDisplayStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn seeded(display: Display) -> Self {
            let store = Self::default();
            store.rows.lock().insert(display.id.clone(), display);
            store
        }
    }

    #[async_trait]
    impl DisplayStore for FakeDisplayStore {
        async fn create(&self, name: String, now: DateTime<Utc>) -> Result<Display> {
            let display = Display::new(name, now);
            self.rows.lock().insert(display.id.clone(), display.clone());
            Ok(display)
        }

        async fn get(&self, id: &DisplayId) -> Result<Option<Display>> {
            Ok(self.rows.lock().get(id).cloned())
        }

        async fn list(&self) -> Result<Vec<Display>> {
            let mut all: Vec<_> = self.rows.lock().values().cloned().collect();
            all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(all)
        }

        async fn delete(&self, id: &DisplayId) -> Result<bool> {
            Ok(self.rows.lock().remove(id).is_some())
        }

        async fn apply_poll_report(
            &self,
            id: &DisplayId,
            liveness: Liveness,
            current_video_id: Option<&VideoId>,
            now: DateTime<Utc>,
        ) -> Result<()> {
            let mut rows = self.rows.lock();
            if let Some(display) = rows.get_mut(id) {
                if display.liveness != liveness {
                    display.last_state_change = now;
                }
                display.liveness = liveness;
                display.current_video_id = current_video_id.cloned();
                display.last_ping = Some(now);
            }
            Ok(())
        }

        async fn set_active_playlist(&self, id: &DisplayId, playlist_id: &PlaylistId) -> Result<()> {
            let mut rows = self.rows.lock();
            if let Some(display) = rows.get_mut(id) {
                display.current_playlist_id = Some(playlist_id.clone());
                display.timeline_position = 0;
            }
            Ok(())
        }

        async fn clear_active_playlist(&self, id: &DisplayId) -> Result<()> {
            let mut rows = self.rows.lock();
            if let Some(display) = rows.get_mut(id) {
                display.current_playlist_id = None;
                display.timeline_position = 0;
            }
            Ok(())
        }

        async fn set_timeline_position(&self, id: &DisplayId, position: i64) -> Result<()> {
            let mut rows = self.rows.lock();
            if let Some(display) = rows.get_mut(id) {
                display.timeline_position = position;
            }
            Ok(())
        }
    }
}
