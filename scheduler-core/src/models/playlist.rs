use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{DisplayId, PlaylistId};

/// An ordered list of Blocks bound to a single display (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub display_id: DisplayId,
    pub name: String,
    pub is_active: bool,
    pub total_blocks: i32,
    pub total_videos: i32,
    pub loop_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a playlist together with its ordered blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    pub display_id: DisplayId,
    pub name: String,
    pub blocks: Vec<NewBlockSpec>,
}

/// Per-block input for `create_playlist`; `block_order` is assigned as the
/// index within this `Vec` (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlockSpec {
    pub search_term: String,
    pub video_count: i32,
    pub fetch_mode: super::block::FetchMode,
    pub orientation: super::video::Orientation,
}
