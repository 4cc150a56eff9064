use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{BlockId, PlaylistId};
use super::video::Orientation;

/// How a block's videos are selected from the catalog's matching universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Newest,
    Random,
}

impl FetchMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Random => "random",
        }
    }
}

/// A named search within a playlist with a target count, a fetch mode,
/// and an orientation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub playlist_id: PlaylistId,
    pub search_term: String,
    pub video_count: i32,
    pub fetch_mode: FetchMode,
    pub orientation: Orientation,
    pub block_order: i32,
    pub times_played: i64,
    pub last_played_at: Option<DateTime<Utc>>,
}
