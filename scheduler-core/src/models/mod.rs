pub mod block;
pub mod command;
pub mod display;
pub mod history;
pub mod id;
pub mod playlist;
pub mod timeline;
pub mod video;

pub use block::{Block, FetchMode};
pub use command::{CommandEnvelope, CommandType};
pub use display::{Display, Liveness};
pub use history::HistoryEntry;
pub use id::{
    generate_display_code, generate_id, BlockId, CommandId, DisplayId, HistoryEntryId,
    PlaylistId, TimelineEntryId, VideoId,
};
pub use playlist::{CreatePlaylistRequest, NewBlockSpec, Playlist};
pub use timeline::{TimelineEntry, TimelineStatus};
pub use video::{CreatorInfo, MediaEncodings, Orientation, VideoPayload, VideoRecord};
