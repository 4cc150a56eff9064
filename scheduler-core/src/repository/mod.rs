//! Storage traits and their Postgres/in-memory implementations (§4
//! Component Design). Each entity gets its own trait so the service
//! layer depends on an interface, not on `sqlx` directly.

pub mod block;
pub mod catalog;
pub mod command;
pub mod display;
pub mod history;
pub mod playlist;
pub mod timeline;

pub use block::{BlockStore, PgBlockRepository};
pub use catalog::{CatalogStore, PgCatalogStore, SelectQuery};
pub use command::{CommandStore, PgCommandRepository};
pub use display::{DisplayStore, PgDisplayRepository};
pub use history::{HistoryStore, PgHistoryRepository};
pub use playlist::{PgPlaylistRepository, PlaylistStore};
pub use timeline::{NewTimelineEntry, PgTimelineRepository, TimelineStore};
