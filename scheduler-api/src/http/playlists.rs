//! Playlist/block CRUD and activation endpoints (§4.2, §6).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use scheduler_core::models::{
    Block, CreatePlaylistRequest, DisplayId, FetchMode, NewBlockSpec, Orientation, Playlist, PlaylistId,
};

use super::error::AppResult;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct NewBlockWire {
    pub search_term: String,
    pub video_count: i32,
    pub fetch_mode: FetchMode,
    pub orientation: Orientation,
}

impl From<NewBlockWire> for NewBlockSpec {
    fn from(wire: NewBlockWire) -> Self {
        Self {
            search_term: wire.search_term,
            video_count: wire.video_count,
            fetch_mode: wire.fetch_mode,
            orientation: wire.orientation,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistWire {
    pub name: String,
    pub blocks: Vec<NewBlockWire>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistWire {
    pub id: String,
    pub display_id: String,
    pub name: String,
    pub is_active: bool,
    pub total_blocks: i32,
    pub total_videos: i32,
    pub loop_count: i64,
}

impl From<Playlist> for PlaylistWire {
    fn from(playlist: Playlist) -> Self {
        Self {
            id: playlist.id.as_str().to_string(),
            display_id: playlist.display_id.as_str().to_string(),
            name: playlist.name,
            is_active: playlist.is_active,
            total_blocks: playlist.total_blocks,
            total_videos: playlist.total_videos,
            loop_count: playlist.loop_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlockWire {
    pub id: String,
    pub search_term: String,
    pub video_count: i32,
    pub fetch_mode: FetchMode,
    pub orientation: Orientation,
    pub block_order: i32,
    pub times_played: i64,
}

impl From<Block> for BlockWire {
    fn from(block: Block) -> Self {
        Self {
            id: block.id.as_str().to_string(),
            search_term: block.search_term,
            video_count: block.video_count,
            fetch_mode: block.fetch_mode,
            orientation: block.orientation,
            block_order: block.block_order,
            times_played: block.times_played,
        }
    }
}

/// `POST /displays/{id}/playlists` (§6).
pub async fn create_playlist(
    State(state): State<AppState>,
    Path(display_id): Path<String>,
    Json(req): Json<CreatePlaylistWire>,
) -> AppResult<Json<PlaylistWire>> {
    let request = CreatePlaylistRequest {
        display_id: DisplayId::from_string(display_id),
        name: req.name,
        blocks: req.blocks.into_iter().map(Into::into).collect(),
    };
    let playlist = state.services.playlist_manager.create_playlist(request).await?;
    Ok(Json(playlist.into()))
}

/// `GET /displays/{id}/playlists` — operator listing.
pub async fn list_playlists(
    State(state): State<AppState>,
    Path(display_id): Path<String>,
) -> AppResult<Json<Vec<PlaylistWire>>> {
    let display_id = DisplayId::from_string(display_id);
    let playlists = state.services.playlist_manager.list_playlists_for_display(&display_id).await?;
    Ok(Json(playlists.into_iter().map(Into::into).collect()))
}

/// `GET /displays/{id}/playlists/{pid}/blocks` — ordered block listing.
pub async fn get_blocks(
    State(state): State<AppState>,
    Path((_display_id, playlist_id)): Path<(String, String)>,
) -> AppResult<Json<Vec<BlockWire>>> {
    let playlist_id = PlaylistId::from_string(playlist_id);
    let blocks = state.services.playlist_manager.get_blocks(&playlist_id).await?;
    Ok(Json(blocks.into_iter().map(Into::into).collect()))
}

/// `POST /displays/{id}/playlists/{pid}/activate` (§4.2, §6). Activation
/// also performs the playlist's first population (§4.3.1): the Timeline
/// Engine's rollover path is reserved for loops that actually complete,
/// so a freshly activated playlist starts at `loop_iteration=0` rather
/// than being mistaken for an exhausted one on the first poll.
pub async fn activate_playlist(
    State(state): State<AppState>,
    Path((display_id, playlist_id)): Path<(String, String)>,
) -> AppResult<axum::http::StatusCode> {
    let display_id = DisplayId::from_string(display_id);
    let playlist_id = PlaylistId::from_string(playlist_id);
    state.services.playlist_manager.activate_playlist(&display_id, &playlist_id).await?;
    state.services.timeline_engine.activate(&display_id, &playlist_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// `DELETE /displays/{id}/playlists/{pid}` — operator cleanup.
pub async fn delete_playlist(
    State(state): State<AppState>,
    Path((display_id, playlist_id)): Path<(String, String)>,
) -> AppResult<axum::http::StatusCode> {
    let display_id = DisplayId::from_string(display_id);
    let playlist_id = PlaylistId::from_string(playlist_id);
    state.services.playlist_manager.delete_playlist(&display_id, &playlist_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    #[serde(default = "default_queue_limit")]
    pub limit: i64,
}

const fn default_queue_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct QueuedEntryWire {
    pub id: String,
    pub video_id: String,
    pub block_id: String,
    pub timeline_position: i64,
    pub block_position: i32,
}

impl From<scheduler_core::models::TimelineEntry> for QueuedEntryWire {
    fn from(entry: scheduler_core::models::TimelineEntry) -> Self {
        Self {
            id: entry.entry_id.as_str().to_string(),
            video_id: entry.video_id.as_str().to_string(),
            block_id: entry.block_id.as_str().to_string(),
            timeline_position: entry.timeline_position,
            block_position: entry.block_position,
        }
    }
}

/// `GET /displays/{id}/queue?limit=N` (§6) — next N queued entries, for
/// operator preview.
pub async fn preview_queue(
    State(state): State<AppState>,
    Path(display_id): Path<String>,
    Query(params): Query<QueueParams>,
) -> AppResult<Json<Vec<QueuedEntryWire>>> {
    let display_id = DisplayId::from_string(display_id);
    let entries = state.services.timeline_engine.preview_queue(&display_id, params.limit).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
