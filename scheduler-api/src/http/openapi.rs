//! OpenAPI document generation (SPEC_FULL §6, ambient per the teacher's
//! `utoipa` usage in `synctv-api`).

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Scheduler API", description = "Multi-display video-playlist scheduler"),
    paths(),
    components(schemas())
)]
pub struct ApiDoc;
