use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{BlockId, DisplayId, HistoryEntryId, VideoId};

/// Long-term record used to exclude videos already played for the same
/// block across future loops (§3). Never deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub history_id: HistoryEntryId,
    pub display_id: DisplayId,
    pub video_id: VideoId,
    pub block_id: BlockId,
    pub loop_iteration: i64,
    pub played_at: DateTime<Utc>,
}
