//! Command queue repository (§3 Command Envelope, §4.5 Command Queue).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};

use crate::models::{CommandEnvelope, CommandId, CommandType, DisplayId};
use crate::Result;

/// Storage interface for the per-display command queue, behind a trait
/// so the service layer can be exercised against an in-memory fake in
/// tests (SPEC_FULL §9.4).
#[async_trait]
pub trait CommandStore: Send + Sync {
    async fn enqueue(
        &self,
        display_id: &DisplayId,
        command_type: CommandType,
        payload: Option<JsonValue>,
        now: DateTime<Utc>,
    ) -> Result<CommandEnvelope>;
    /// Atomically read and remove every pending command for a display, in
    /// FIFO order (§4.5 invariant: each command delivered to at most one
    /// poll, in enqueue order). Ordered by the monotonic `seq` column, not
    /// `enqueued_at`: the injected clock can report the same timestamp for
    /// two commands enqueued in the same tick, and `enqueued_at` alone
    /// would then order them arbitrarily.
    async fn drain(&self, display_id: &DisplayId) -> Result<Vec<CommandEnvelope>>;
}

#[derive(Clone)]
pub struct PgCommandRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct CommandRow {
    command_id: String,
    display_id: String,
    command_type: String,
    payload: Option<JsonValue>,
    enqueued_at: DateTime<Utc>,
    #[allow(dead_code)]
    seq: i64,
}

impl From<CommandRow> for CommandEnvelope {
    fn from(row: CommandRow) -> Self {
        Self {
            command_id: CommandId::from_string(row.command_id),
            display_id: DisplayId::from_string(row.display_id),
            command_type: match row.command_type.as_str() {
                "pause" => CommandType::Pause,
                "mute" => CommandType::Mute,
                "unmute" => CommandType::Unmute,
                "next" => CommandType::Next,
                "seek" => CommandType::Seek,
                _ => CommandType::Play,
            },
            payload: row.payload,
            enqueued_at: row.enqueued_at,
        }
    }
}

impl PgCommandRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommandStore for PgCommandRepository {
    async fn enqueue(
        &self,
        display_id: &DisplayId,
        command_type: CommandType,
        payload: Option<JsonValue>,
        now: DateTime<Utc>,
    ) -> Result<CommandEnvelope> {
        let id = CommandId::new();
        sqlx::query(
            r"
            INSERT INTO commands (command_id, display_id, command_type, payload, enqueued_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(id.as_str())
        .bind(display_id.as_str())
        .bind(command_type.as_str())
        .bind(&payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(CommandEnvelope {
            command_id: id,
            display_id: display_id.clone(),
            command_type,
            payload,
            enqueued_at: now,
        })
    }

    async fn drain(&self, display_id: &DisplayId) -> Result<Vec<CommandEnvelope>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, CommandRow>(
            r"
            SELECT command_id, display_id, command_type, payload, enqueued_at, seq
            FROM commands WHERE display_id = $1
            ORDER BY seq ASC
            FOR UPDATE SKIP LOCKED
            ",
        )
        .bind(display_id.as_str())
        .fetch_all(&mut *tx)
        .await?;

        if !rows.is_empty() {
            sqlx::query("DELETE FROM commands WHERE display_id = $1")
                .bind(display_id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::{CommandEnvelope, CommandId, CommandStore, CommandType, DisplayId, JsonValue};
    use crate::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeCommandStore {
        rows: Mutex<Vec<CommandEnvelope>>,
    }

    impl FakeCommandStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl CommandStore for FakeCommandStore {
        async fn enqueue(
            &self,
            display_id: &DisplayId,
            command_type: CommandType,
            payload: Option<JsonValue>,
            now: DateTime<Utc>,
        ) -> Result<CommandEnvelope> {
            let envelope = CommandEnvelope {
                command_id: CommandId::new(),
                display_id: display_id.clone(),
                command_type,
                payload,
                enqueued_at: now,
            };
            self.rows.lock().push(envelope.clone());
            Ok(envelope)
        }

        async fn drain(&self, display_id: &DisplayId) -> Result<Vec<CommandEnvelope>> {
            let mut rows = self.rows.lock();
            let (matching, rest): (Vec<_>, Vec<_>) =
                rows.drain(..).partition(|c| &c.display_id == display_id);
            *rows = rest;
            Ok(matching)
        }
    }
}
