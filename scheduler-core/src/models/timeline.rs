use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{BlockId, DisplayId, PlaylistId, TimelineEntryId, VideoId};
use super::video::VideoPayload;

/// One queued or played slot of a display's timeline (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineStatus {
    Queued,
    Played,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub entry_id: TimelineEntryId,
    pub display_id: DisplayId,
    pub playlist_id: PlaylistId,
    pub block_id: BlockId,
    pub video_id: VideoId,
    pub block_position: i32,
    pub timeline_position: i64,
    pub loop_iteration: i64,
    pub status: TimelineStatus,
    pub played_at: Option<DateTime<Utc>>,
    pub video_payload: VideoPayload,
}
