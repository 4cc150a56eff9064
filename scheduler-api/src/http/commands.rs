//! Operator command enqueue endpoint (§4.5 Command Queue).

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use scheduler_core::models::{CommandType, DisplayId};
use scheduler_core::repository::CommandStore;

use super::error::AppResult;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueCommandRequest {
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub payload: Option<JsonValue>,
}

fn parse_command_type(raw: &str) -> Result<CommandType, scheduler_core::Error> {
    match raw.to_lowercase().as_str() {
        "play" => Ok(CommandType::Play),
        "pause" => Ok(CommandType::Pause),
        "mute" => Ok(CommandType::Mute),
        "unmute" => Ok(CommandType::Unmute),
        "next" => Ok(CommandType::Next),
        "seek" => Ok(CommandType::Seek),
        other => Err(scheduler_core::Error::InvalidArgument(format!("unknown command type: {other}"))),
    }
}

/// `POST /displays/{id}/commands` (§6).
pub async fn enqueue_command(
    State(state): State<AppState>,
    Path(display_id): Path<String>,
    Json(req): Json<EnqueueCommandRequest>,
) -> AppResult<axum::http::StatusCode> {
    let display_id = DisplayId::from_string(display_id);
    let command_type = parse_command_type(&req.command_type)?;
    let now = state.services.clock.now();
    state.services.commands.enqueue(&display_id, command_type, req.payload, now).await?;
    Ok(axum::http::StatusCode::CREATED)
}
