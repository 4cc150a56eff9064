//! Bootstrap: configuration loading, database pool setup, and service
//! wiring for the `scheduler` binary (SPEC_FULL §9.5).

pub mod config;
pub mod database;
pub mod services;

pub use config::load_config;
pub use database::init_database;
pub use services::{init_services, Services};
