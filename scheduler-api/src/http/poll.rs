//! Display poll/dispatch endpoints (§4.4 Poll Endpoint / Dispatcher).

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use scheduler_core::models::{CommandType, DisplayId, Liveness, TimelineEntry, TimelineEntryId, VideoId};
use scheduler_core::repository::{BlockStore, CommandStore, DisplayStore, PlaylistStore};

use super::error::AppResult;
use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub status: String,
    #[serde(default)]
    pub current_video_id: Option<String>,
    #[serde(default)]
    pub position: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub display_name: String,
    pub commands: Vec<CommandWire>,
    pub next_video: Option<NextVideoWire>,
    pub progress: ProgressWire,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandWire {
    #[serde(rename = "type")]
    pub command_type: &'static str,
    pub payload: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextVideoWire {
    pub id: String,
    pub video_id: String,
    pub timeline_position: i64,
    pub block_position: i32,
    pub block_id: String,
    pub video_data: scheduler_core::models::VideoPayload,
}

impl From<TimelineEntry> for NextVideoWire {
    fn from(entry: TimelineEntry) -> Self {
        Self {
            id: entry.entry_id.as_str().to_string(),
            video_id: entry.video_id.as_str().to_string(),
            timeline_position: entry.timeline_position,
            block_position: entry.block_position,
            block_id: entry.block_id.as_str().to_string(),
            video_data: entry.video_payload,
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressWire {
    pub current_block_index: Option<i32>,
    pub position_in_block: Option<i64>,
    pub block_progress: Option<f64>,
    pub loop_count: i64,
    pub total_blocks: i32,
    pub total_videos: i32,
}

/// `POST /poll/{display_id}` (§4.4). The sole authority for liveness and
/// the sole writer of display-reported state.
pub async fn poll(
    State(state): State<AppState>,
    Path(display_id): Path<String>,
    Json(req): Json<PollRequest>,
) -> AppResult<Json<PollResponse>> {
    let display_id = DisplayId::from_string(display_id);
    let display = state
        .services
        .displays
        .get(&display_id)
        .await?
        .ok_or_else(|| scheduler_core::Error::NotFound(format!("display {display_id} not found")))?;

    let now = state.services.clock.now();
    let reported_liveness = Liveness::clamp(&req.status);
    let reported_video_id = req.current_video_id.clone().map(VideoId::from_string);

    state
        .services
        .displays
        .apply_poll_report(&display_id, reported_liveness, reported_video_id.as_ref(), now)
        .await?;

    let drained = state.services.commands.drain(&display_id).await?;
    let commands = drained
        .into_iter()
        .map(|c| CommandWire {
            command_type: command_type_str(c.command_type),
            payload: c.payload,
        })
        .collect();

    if req.current_video_id.is_none() {
        if let Some(current) = state.services.timeline_engine.next_for_display(&display_id).await? {
            if Some(&current.video_id) == display.current_video_id.as_ref() {
                state.services.timeline_engine.mark_played(&current.entry_id).await?;
            }
        }
    }

    let next = state.services.timeline_engine.next_with_rollover(&display_id).await?;
    let progress = compute_progress(&state, &display_id).await?;

    Ok(Json(PollResponse {
        display_name: display.name,
        commands,
        next_video: next.map(Into::into),
        progress,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPlayedRequest {
    pub timeline_video_id: String,
}

/// `POST /timeline/mark-played` (§4.4, §4.3.3). Idempotent on replay.
pub async fn mark_played(
    State(state): State<AppState>,
    Json(req): Json<MarkPlayedRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let entry_id = TimelineEntryId::from_string(req.timeline_video_id);
    state.services.timeline_engine.mark_played(&entry_id).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

fn command_type_str(command_type: CommandType) -> &'static str {
    command_type.as_str()
}

/// Progress derivation (§4.4.1): a read-only projection computed from
/// each block's target `video_count`, not the number of produced entries.
async fn compute_progress(state: &AppState, display_id: &DisplayId) -> AppResult<ProgressWire> {
    let Some(display) = state.services.displays.get(display_id).await? else {
        return Ok(ProgressWire::default());
    };
    let Some(playlist_id) = display.current_playlist_id else {
        return Ok(ProgressWire::default());
    };
    let Some(playlist) = state.services.playlists.get(&playlist_id).await? else {
        return Ok(ProgressWire::default());
    };
    let blocks = state.services.blocks.list_for_playlist(&playlist_id).await?;

    let position = display.timeline_position;
    let mut cumulative: i64 = 0;
    let mut current_block_index = None;
    let mut position_in_block = None;
    let mut block_progress = None;

    for (index, block) in blocks.iter().enumerate() {
        let count = i64::from(block.video_count);
        if position < cumulative + count {
            current_block_index = Some(i32::try_from(index).unwrap_or(i32::MAX));
            let local = position - cumulative;
            position_in_block = Some(local);
            block_progress = Some(local as f64 / count as f64);
            break;
        }
        cumulative += count;
    }

    Ok(ProgressWire {
        current_block_index,
        position_in_block,
        block_progress,
        loop_count: playlist.loop_count,
        total_blocks: playlist.total_blocks,
        total_videos: playlist.total_videos,
    })
}
