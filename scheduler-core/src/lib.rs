pub mod bootstrap;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod service;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
