//! HTTP/JSON surface for the scheduler (§6 External Interfaces).

pub mod http;

pub use http::{create_router, AppState};
