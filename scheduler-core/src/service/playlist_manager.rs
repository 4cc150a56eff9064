//! Playlist Manager (C4, §4.2): CRUD for playlists and their ordered
//! blocks, and activation of the one playlist per display.

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::models::{Block, CreatePlaylistRequest, Playlist, PlaylistId};
use crate::repository::block::BlockStore;
use crate::repository::display::DisplayStore;
use crate::repository::playlist::PlaylistStore;
use crate::{Error, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct PlaylistManager {
    playlists: Arc<dyn PlaylistStore>,
    blocks: Arc<dyn BlockStore>,
    displays: Arc<dyn DisplayStore>,
    clock: Arc<dyn Clock>,
}

impl PlaylistManager {
    #[must_use]
    pub fn new(
        playlists: Arc<dyn PlaylistStore>,
        blocks: Arc<dyn BlockStore>,
        displays: Arc<dyn DisplayStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            playlists,
            blocks,
            displays,
            clock,
        }
    }

    /// `create_playlist(display_id, name, blocks[])` (§4.2). Fails with
    /// `NotFound` if the display is unknown, `InvalidArgument` if `blocks`
    /// is empty or any `video_count < 1`. `block_order` is assigned as
    /// the input index.
    pub async fn create_playlist(&self, request: CreatePlaylistRequest) -> Result<Playlist> {
        if request.blocks.is_empty() {
            return Err(Error::InvalidArgument("playlist must have at least one block".to_string()));
        }
        for spec in &request.blocks {
            if spec.video_count < 1 {
                return Err(Error::InvalidArgument("block video_count must be >= 1".to_string()));
            }
            if spec.search_term.trim().is_empty() {
                return Err(Error::InvalidArgument("block search_term must not be empty".to_string()));
            }
        }

        if self.displays.get(&request.display_id).await?.is_none() {
            return Err(Error::NotFound(format!("display {} not found", request.display_id)));
        }

        let now = self.clock.now();
        let total_blocks = i32::try_from(request.blocks.len()).unwrap_or(i32::MAX);
        let total_videos: i32 = request.blocks.iter().map(|b| b.video_count).sum();

        let playlist = self
            .playlists
            .create(&request.display_id, &request.name, total_blocks, total_videos, now)
            .await?;

        let specs: Vec<_> = request
            .blocks
            .into_iter()
            .map(|b| (b.search_term, b.video_count, b.fetch_mode, b.orientation))
            .collect();
        self.blocks.create_many(&playlist.id, &specs).await?;

        Ok(playlist)
    }

    /// `activate_playlist(display_id, playlist_id)` (§4.2): the only
    /// legal path to begin a playlist. Atomically clears any prior active
    /// flag for the display, sets the target active, points the display
    /// at it, and resets `timeline_position` to 0.
    ///
    /// Caller (the Timeline Engine) is responsible for clearing and
    /// populating the display's timeline after this returns.
    pub async fn activate_playlist(&self, display_id: &crate::models::DisplayId, playlist_id: &PlaylistId) -> Result<()> {
        let playlist = self
            .playlists
            .get(playlist_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("playlist {playlist_id} not found")))?;
        if &playlist.display_id != display_id {
            return Err(Error::NotFound(format!("playlist {playlist_id} not found for display {display_id}")));
        }

        let now = self.clock.now();
        self.playlists.activate(display_id, playlist_id, now).await?;
        self.displays.set_active_playlist(display_id, playlist_id).await?;
        Ok(())
    }

    pub async fn list_playlists_for_display(&self, display_id: &crate::models::DisplayId) -> Result<Vec<Playlist>> {
        self.playlists.list_for_display(display_id).await
    }

    /// Ordered blocks of a playlist (§4.2 `get_blocks`).
    pub async fn get_blocks(&self, playlist_id: &PlaylistId) -> Result<Vec<Block>> {
        self.blocks.list_for_playlist(playlist_id).await
    }

    /// Deletes the playlist; if it was the display's active playlist,
    /// clears that reference too (§4.2 invariant).
    pub async fn delete_playlist(&self, display_id: &crate::models::DisplayId, playlist_id: &PlaylistId) -> Result<()> {
        let playlist = self.playlists.get(playlist_id).await?;
        let was_active = playlist.as_ref().is_some_and(|p| p.is_active);

        if !self.playlists.delete(playlist_id).await? {
            return Err(Error::NotFound(format!("playlist {playlist_id} not found")));
        }

        if was_active {
            self.displays.clear_active_playlist(display_id).await?;
        }
        Ok(())
    }

    pub async fn rename_playlist(&self, playlist_id: &PlaylistId, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("playlist name must not be empty".to_string()));
        }
        self.playlists.rename(playlist_id, name, self.clock.now()).await
    }

    /// Called by the Timeline Engine only (§4.2).
    pub async fn increment_loop_count(&self, playlist_id: &PlaylistId) -> Result<i64> {
        self.playlists.increment_loop_count(playlist_id).await
    }

    /// Increments `times_played`, sets `last_played_at` (§4.2).
    pub async fn record_block_played(&self, block_id: &crate::models::BlockId) -> Result<()> {
        self.blocks.record_played(block_id, self.clock.now()).await
    }

    pub async fn get_playlist(&self, playlist_id: &PlaylistId) -> Result<Playlist> {
        self.playlists
            .get(playlist_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("playlist {playlist_id} not found")))
    }

    pub async fn get_active_for_display(&self, display_id: &crate::models::DisplayId) -> Result<Option<Playlist>> {
        self.playlists.get_active_for_display(display_id).await
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{FetchMode, NewBlockSpec, Orientation};
    use crate::repository::block::fake::FakeBlockStore;
    use crate::repository::display::fake::FakeDisplayStore;
    use crate::repository::playlist::fake::FakePlaylistStore;
    use chrono::{TimeZone, Utc};

    fn manager() -> (PlaylistManager, crate::models::DisplayId) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let display = crate::models::Display::new("lobby".to_string(), now);
        let display_id = display.id.clone();
        let displays: Arc<dyn DisplayStore> = Arc::new(FakeDisplayStore::seeded(display));
        let playlists: Arc<dyn PlaylistStore> = Arc::new(FakePlaylistStore::new());
        let blocks: Arc<dyn BlockStore> = Arc::new(FakeBlockStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));
        (PlaylistManager::new(playlists, blocks, displays, clock), display_id)
    }

    fn request(display_id: crate::models::DisplayId) -> CreatePlaylistRequest {
        CreatePlaylistRequest {
            display_id,
            name: "evening set".to_string(),
            blocks: vec![NewBlockSpec {
                search_term: "sunset".to_string(),
                video_count: 5,
                fetch_mode: FetchMode::Newest,
                orientation: Orientation::Mixed,
            }],
        }
    }

    #[tokio::test]
    async fn create_playlist_rejects_empty_blocks() {
        let (manager, display_id) = manager();
        let mut req = request(display_id);
        req.blocks.clear();
        let err = manager.create_playlist(req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_playlist_rejects_unknown_display() {
        let (manager, _) = manager();
        let req = request(crate::models::DisplayId::from_string("NOPE01".to_string()));
        let err = manager.create_playlist(req).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn create_then_activate_sets_display_pointer() {
        let (manager, display_id) = manager();
        let playlist = manager.create_playlist(request(display_id.clone())).await.unwrap();
        assert_eq!(playlist.total_videos, 5);

        manager.activate_playlist(&display_id, &playlist.id).await.unwrap();
        let active = manager.get_active_for_display(&display_id).await.unwrap().unwrap();
        assert_eq!(active.id, playlist.id);
        assert!(active.is_active);
    }

    #[tokio::test]
    async fn activate_playlist_rejects_mismatched_display() {
        let (manager, display_id) = manager();
        let playlist = manager.create_playlist(request(display_id)).await.unwrap();
        let other = crate::models::DisplayId::from_string("OTHER1".to_string());
        let err = manager.activate_playlist(&other, &playlist.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_active_playlist_clears_display_pointer() {
        let (manager, display_id) = manager();
        let playlist = manager.create_playlist(request(display_id.clone())).await.unwrap();
        manager.activate_playlist(&display_id, &playlist.id).await.unwrap();

        manager.delete_playlist(&display_id, &playlist.id).await.unwrap();
        assert!(manager.get_active_for_display(&display_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_playlist_rejects_blank_name() {
        let (manager, display_id) = manager();
        let playlist = manager.create_playlist(request(display_id)).await.unwrap();
        let err = manager.rename_playlist(&playlist.id, "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
