//! HTTP/JSON REST API (§6 External Interfaces).

pub mod commands;
pub mod displays;
pub mod error;
pub mod health;
pub mod openapi;
pub mod playlists;
pub mod poll;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use scheduler_core::bootstrap::Services;
use scheduler_core::Config;

pub use error::{AppResult, ApiError};

/// Shared application state handed to every handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Services,
    pub pool: PgPool,
}

/// Build the full axum router from the wired services, config, and pool.
#[must_use]
pub fn create_router(config: Arc<Config>, services: Services, pool: PgPool) -> Router {
    let state = AppState { config, services, pool };

    let router = Router::new()
        .merge(health::router())
        .route("/poll/{display_id}", post(poll::poll))
        .route("/timeline/mark-played", post(poll::mark_played))
        .route("/displays", get(displays::list_displays).post(displays::create_display))
        .route(
            "/displays/{display_id}",
            get(displays::get_display).delete(displays::delete_display),
        )
        .route(
            "/displays/{display_id}/playlists",
            get(playlists::list_playlists).post(playlists::create_playlist),
        )
        .route(
            "/displays/{display_id}/playlists/{playlist_id}",
            axum::routing::delete(playlists::delete_playlist),
        )
        .route("/displays/{display_id}/playlists/{playlist_id}/blocks", get(playlists::get_blocks))
        .route(
            "/displays/{display_id}/playlists/{playlist_id}/activate",
            post(playlists::activate_playlist),
        )
        .route("/displays/{display_id}/queue", get(playlists::preview_queue))
        .route("/displays/{display_id}/commands", post(commands::enqueue_command))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()));

    apply_global_layers(router, &state)
}

fn apply_global_layers(router: Router<AppState>, state: &AppState) -> Router {
    router
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.scheduler.catalog_query_timeout_seconds,
        )))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
}
