use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{DisplayId, PlaylistId, VideoId};

/// Liveness states a display may report itself in, or be assigned when
/// unresponsive. Wire representation per §3/§6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Offline,
    Idle,
    Loading,
    Playing,
    Paused,
}

impl Liveness {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }

    /// Clamp an arbitrary reported string onto the allowed set, defaulting
    /// to `idle` for anything unrecognized (§4.4 step 2).
    #[must_use]
    pub fn clamp(reported: &str) -> Self {
        match reported.to_lowercase().as_str() {
            "offline" => Self::Offline,
            "loading" => Self::Loading,
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            _ => Self::Idle,
        }
    }
}

/// A remote display client ("VM") the scheduler dispenses videos to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Display {
    pub id: DisplayId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
    pub liveness: Liveness,
    pub current_video_id: Option<VideoId>,
    pub current_playlist_id: Option<PlaylistId>,
    pub timeline_position: i64,
    pub last_state_change: DateTime<Utc>,
}

impl Display {
    #[must_use]
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: DisplayId::new(),
            name,
            created_at: now,
            last_ping: None,
            liveness: Liveness::Offline,
            current_video_id: None,
            current_playlist_id: None,
            timeline_position: 0,
            last_state_change: now,
        }
    }

    /// Whether this display is online, i.e. its last ping is within
    /// `threshold` of `now` (§5 Liveness).
    #[must_use]
    pub fn is_online(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        match self.last_ping {
            Some(last_ping) => now - last_ping <= threshold,
            None => false,
        }
    }
}
