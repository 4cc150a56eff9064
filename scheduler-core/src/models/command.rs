use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::id::{CommandId, DisplayId};

/// Operator-to-display command kinds (§3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Play,
    Pause,
    Mute,
    Unmute,
    Next,
    Seek,
}

impl CommandType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Next => "next",
            Self::Seek => "seek",
        }
    }
}

/// A single operator command, enqueued once and drained at most once by
/// the next poll from its target display (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command_id: CommandId,
    pub display_id: DisplayId,
    pub command_type: CommandType,
    pub payload: Option<JsonValue>,
    pub enqueued_at: DateTime<Utc>,
}
