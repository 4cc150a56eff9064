//! Display provisioning endpoints (§6 External Interfaces).

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use scheduler_core::models::DisplayId;
use scheduler_core::repository::DisplayStore;

use super::error::AppResult;
use super::AppState;

#[derive(Debug, Serialize)]
pub struct DisplayWire {
    pub id: String,
    pub name: String,
    pub liveness: &'static str,
    pub last_ping: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<scheduler_core::models::Display> for DisplayWire {
    fn from(display: scheduler_core::models::Display) -> Self {
        Self {
            id: display.id.as_str().to_string(),
            name: display.name,
            liveness: display.liveness.as_str(),
            last_ping: display.last_ping,
        }
    }
}

/// `GET /displays/{display_id}` (§6).
pub async fn get_display(
    State(state): State<AppState>,
    Path(display_id): Path<String>,
) -> AppResult<Json<DisplayWire>> {
    let display_id = DisplayId::from_string(display_id);
    let display = state
        .services
        .displays
        .get(&display_id)
        .await?
        .ok_or_else(|| scheduler_core::Error::NotFound(format!("display {display_id} not found")))?;
    Ok(Json(display.into()))
}

/// `GET /displays` — operator listing, for interface completeness.
pub async fn list_displays(State(state): State<AppState>) -> AppResult<Json<Vec<DisplayWire>>> {
    let displays = state.services.displays.list().await?;
    Ok(Json(displays.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateDisplayRequest {
    pub name: String,
}

/// `POST /displays` — provision a new display and mint its pairing code.
pub async fn create_display(
    State(state): State<AppState>,
    Json(req): Json<CreateDisplayRequest>,
) -> AppResult<Json<DisplayWire>> {
    let now = state.services.clock.now();
    let display = state.services.displays.create(req.name, now).await?;
    Ok(Json(display.into()))
}

/// `DELETE /displays/{id}` (§6).
pub async fn delete_display(
    State(state): State<AppState>,
    Path(display_id): Path<String>,
) -> AppResult<axum::http::StatusCode> {
    let display_id = DisplayId::from_string(display_id);
    let deleted = state.services.displays.delete(&display_id).await?;
    if deleted {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(scheduler_core::Error::NotFound(format!("display {display_id} not found")).into())
    }
}
