//! Timeline Engine (C5, §4.3): the hardest component. Populates,
//! advances, and rolls over per-display timelines, recording history and
//! updating block statistics.

use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::Clock;
use crate::metrics;
use crate::models::{DisplayId, PlaylistId, TimelineEntry, TimelineEntryId};
use crate::repository::block::BlockStore;
use crate::repository::display::DisplayStore;
use crate::repository::history::HistoryStore;
use crate::repository::playlist::PlaylistStore;
use crate::repository::timeline::{NewTimelineEntry, TimelineStore};
use crate::service::catalog_search::CatalogSearchService;
use crate::service::locks::DisplayLocks;
use crate::{Error, Result};

/// Outcome of a rollover attempt (§4.3.4), surfaced so callers (the Poll
/// Endpoint, tests) can distinguish a healthy re-population from the
/// "idle, no-content" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverOutcome {
    Populated { entries_created: usize },
    Empty,
}

#[derive(Clone)]
pub struct TimelineEngine {
    timeline: Arc<dyn TimelineStore>,
    history: Arc<dyn HistoryStore>,
    blocks: Arc<dyn BlockStore>,
    playlists: Arc<dyn PlaylistStore>,
    displays: Arc<dyn DisplayStore>,
    catalog: CatalogSearchService,
    clock: Arc<dyn Clock>,
    locks: DisplayLocks,
}

impl TimelineEngine {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timeline: Arc<dyn TimelineStore>,
        history: Arc<dyn HistoryStore>,
        blocks: Arc<dyn BlockStore>,
        playlists: Arc<dyn PlaylistStore>,
        displays: Arc<dyn DisplayStore>,
        catalog: CatalogSearchService,
        clock: Arc<dyn Clock>,
        locks: DisplayLocks,
    ) -> Self {
        Self {
            timeline,
            history,
            blocks,
            playlists,
            displays,
            catalog,
            clock,
            locks,
        }
    }

    /// `populate(display_id, playlist_id, loop_iteration)` (§4.3.1).
    /// Preconditions: any prior timeline entries for this display have
    /// already been cleared by the caller for this loop.
    pub async fn populate(
        &self,
        display_id: &DisplayId,
        playlist_id: &PlaylistId,
        loop_iteration: i64,
    ) -> Result<usize> {
        let blocks = self.blocks.list_for_playlist(playlist_id).await?;
        let mut running_position: i64 = 0;
        let mut entries: Vec<NewTimelineEntry> = Vec::new();

        for block in &blocks {
            let exclude: HashSet<_> = self.history.played_video_ids(display_id, &block.id).await?;

            let count = u32::try_from(block.video_count).unwrap_or(0);
            if count == 0 {
                continue;
            }

            let records = self
                .catalog
                .select(&block.search_term, count, block.fetch_mode, block.orientation, &exclude)
                .await?;

            for (block_position, record) in records.iter().enumerate() {
                entries.push(NewTimelineEntry {
                    block_id: block.id.clone(),
                    video_id: record.video_id.clone(),
                    block_position: i32::try_from(block_position).unwrap_or(i32::MAX),
                    timeline_position: running_position,
                    loop_iteration,
                    video_payload: record.to_payload(),
                });
                running_position += 1;
            }
        }

        let created = entries.len();
        if created > 0 {
            self.timeline.populate(display_id, playlist_id, &entries).await?;
        }
        Ok(created)
    }

    /// `next_for_display` (§4.3.2): the queued entry with the smallest
    /// `timeline_position`, or `None`. Pure read; never mutates status.
    pub async fn next_for_display(&self, display_id: &DisplayId) -> Result<Option<TimelineEntry>> {
        self.timeline.next_queued(display_id, 0).await
    }

    /// First population of a freshly activated playlist (§4.2
    /// `activate_playlist`, §4.3.1 "on first activation, there are
    /// none [prior entries]"). Unlike rollover, this never advances
    /// `loop_count`: the loop being populated is `playlist.loop_count`
    /// itself (0 on a brand-new playlist, or wherever a previously-used
    /// playlist left off if it is reactivated).
    pub async fn activate(&self, display_id: &DisplayId, playlist_id: &PlaylistId) -> Result<usize> {
        let _guard = self.locks.acquire(display_id).await;

        let playlist = self
            .playlists
            .get(playlist_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("playlist {playlist_id} not found")))?;

        self.timeline.clear_for_playlist(display_id, playlist_id).await?;
        self.displays.set_timeline_position(display_id, 0).await?;
        self.populate(display_id, playlist_id, playlist.loop_count).await
    }

    /// `mark_played(entry_id)` (§4.3.3). Idempotent: a replay on an
    /// already-played entry has no further effect.
    pub async fn mark_played(&self, entry_id: &TimelineEntryId) -> Result<()> {
        let entry = self
            .timeline
            .get(entry_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("timeline entry {entry_id} not found")))?;

        let _guard = self.locks.acquire(&entry.display_id).await;
        let now = self.clock.now();

        let transitioned = self.timeline.mark_played(entry_id, now).await?;
        metrics::timeline::MARK_PLAYED_TOTAL
            .with_label_values(&[if transitioned { "transitioned" } else { "idempotent_replay" }])
            .inc();

        if transitioned {
            self.history
                .record(&entry.display_id, &entry.video_id, &entry.block_id, entry.loop_iteration, now)
                .await?;
            self.blocks.record_played(&entry.block_id, now).await?;
            self.displays
                .set_timeline_position(&entry.display_id, entry.timeline_position + 1)
                .await?;
        }

        Ok(())
    }

    /// Rollover (§4.3.4): clears the concluded loop's entries and
    /// re-populates the next one. A no-op if the display has no active
    /// playlist. Never loops infinitely: a population that yields zero
    /// entries still advances `loop_count` and returns `Empty` rather
    /// than retrying within this call.
    pub async fn rollover(&self, display_id: &DisplayId) -> Result<Option<RolloverOutcome>> {
        let _guard = self.locks.acquire(display_id).await;

        let Some(display) = self.displays.get(display_id).await? else {
            return Err(Error::NotFound(format!("display {display_id} not found")));
        };
        let Some(playlist_id) = display.current_playlist_id else {
            return Ok(None);
        };
        let Some(playlist) = self.playlists.get(&playlist_id).await? else {
            return Ok(None);
        };

        let next_loop = self.playlists.increment_loop_count(&playlist.id).await?;
        self.timeline.clear_for_playlist(display_id, &playlist.id).await?;
        self.displays.set_timeline_position(display_id, 0).await?;

        let created = self.populate(display_id, &playlist.id, next_loop).await?;

        let outcome = if created > 0 {
            RolloverOutcome::Populated { entries_created: created }
        } else {
            RolloverOutcome::Empty
        };
        metrics::timeline::ROLLOVERS_TOTAL
            .with_label_values(&[if created > 0 { "populated" } else { "empty" }])
            .inc();

        Ok(Some(outcome))
    }

    /// Dispatch with rollover fallback: the shape the Poll Endpoint needs
    /// (§4.4 step 5) — compute next, and if exhausted, roll over once and
    /// recompute.
    pub async fn next_with_rollover(&self, display_id: &DisplayId) -> Result<Option<TimelineEntry>> {
        if let Some(next) = self.next_for_display(display_id).await? {
            return Ok(Some(next));
        }
        self.rollover(display_id).await?;
        self.next_for_display(display_id).await
    }

    /// Next `limit` queued entries in order, for operator preview
    /// (§6 `GET /displays/{id}/queue?limit=N`).
    pub async fn preview_queue(&self, display_id: &DisplayId, limit: i64) -> Result<Vec<TimelineEntry>> {
        self.timeline.preview_queue(display_id, limit).await
    }

    /// `reset_blocks_to_target(display_id, playlist_id)` (§4.3.5):
    /// operational maintenance that trims over-populated blocks in the
    /// live timeline back to their configured `video_count`. Never adds
    /// entries.
    pub async fn reset_blocks_to_target(&self, display_id: &DisplayId, playlist_id: &PlaylistId) -> Result<()> {
        let blocks = self.blocks.list_for_playlist(playlist_id).await?;
        for block in blocks {
            self.timeline
                .trim_block_to_target(display_id, &block.id, i64::from(block.video_count))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CountCache;
    use crate::clock::ManualClock;
    use crate::models::{CreatorInfo, Display, FetchMode, MediaEncodings, Orientation, VideoId, VideoRecord};
    use crate::repository::block::fake::FakeBlockStore;
    use crate::repository::catalog::fake::FakeCatalogStore;
    use crate::repository::display::fake::FakeDisplayStore;
    use crate::repository::history::fake::FakeHistoryStore;
    use crate::repository::playlist::fake::FakePlaylistStore;
    use crate::repository::timeline::fake::FakeTimelineStore;
    use chrono::{TimeZone, Utc};

    fn mk(id: &str, text: &str, w: i32, h: i32, ts: i64) -> VideoRecord {
        VideoRecord {
            video_id: VideoId::from_string(id.to_string()),
            creator: CreatorInfo {
                id: "c1".into(),
                username: "creator".into(),
                display_name: "Creator".into(),
            },
            text: text.to_string(),
            posted_at: Utc.timestamp_opt(ts, 0).unwrap(),
            permalink: format!("https://example/{id}"),
            width: w,
            height: h,
            encodings: MediaEncodings {
                source: "https://example/src".into(),
                md: None,
                thumbnail: None,
                gif: None,
            },
        }
    }

    fn catalog(records: Vec<VideoRecord>) -> CatalogSearchService {
        let store: Arc<dyn crate::repository::catalog::CatalogStore> = Arc::new(FakeCatalogStore::new(records));
        CatalogSearchService::new(store, CountCache::new(std::time::Duration::from_secs(3600)), 2, 30)
    }

    struct Harness {
        engine: TimelineEngine,
        blocks: Arc<FakeBlockStore>,
        playlists: Arc<FakePlaylistStore>,
        displays: Arc<FakeDisplayStore>,
        now: chrono::DateTime<Utc>,
    }

    async fn harness(records: Vec<VideoRecord>, block_specs: &[(String, i32, FetchMode, Orientation)]) -> Harness {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let display = Display::new("lobby".to_string(), now);
        let display_id = display.id.clone();

        let displays = Arc::new(FakeDisplayStore::seeded(display));
        let playlists = Arc::new(FakePlaylistStore::new());
        let blocks = Arc::new(FakeBlockStore::new());
        let history: Arc<dyn HistoryStore> = Arc::new(FakeHistoryStore::new());
        let timeline: Arc<dyn TimelineStore> = Arc::new(FakeTimelineStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));

        let playlist = playlists.create(&display_id, "set", block_specs.len() as i32, 0, now).await.unwrap();
        blocks.create_many(&playlist.id, block_specs).await.unwrap();
        displays.set_active_playlist(&display_id, &playlist.id).await.unwrap();

        let engine = TimelineEngine::new(
            timeline,
            history,
            blocks.clone() as Arc<dyn BlockStore>,
            playlists.clone() as Arc<dyn PlaylistStore>,
            displays.clone() as Arc<dyn DisplayStore>,
            catalog(records),
            clock,
            DisplayLocks::new(),
        );

        Harness {
            engine,
            blocks,
            playlists,
            displays,
            now,
        }
    }

    async fn display_id_of(h: &Harness) -> DisplayId {
        h.displays.list().await.unwrap().remove(0).id
    }

    async fn playlist_id_of(h: &Harness, display_id: &DisplayId) -> PlaylistId {
        h.playlists.get_active_for_display(display_id).await.unwrap().unwrap().id
    }

    #[tokio::test]
    async fn activate_populates_loop_zero_without_touching_loop_count() {
        let records = vec![mk("v1", "sunset walk", 20, 10, 1), mk("v2", "sunset drive", 20, 10, 2)];
        let specs = vec![("sunset".to_string(), 1, FetchMode::Newest, Orientation::Mixed)];
        let h = harness(records, &specs).await;
        let display_id = display_id_of(&h).await;
        let playlist_id = playlist_id_of(&h, &display_id).await;

        let created = h.engine.activate(&display_id, &playlist_id).await.unwrap();
        assert_eq!(created, 1);

        let entry = h.engine.next_for_display(&display_id).await.unwrap().unwrap();
        assert_eq!(entry.loop_iteration, 0);
        assert_eq!(entry.video_id.as_str(), "v2");

        let playlist = h.playlists.get(&playlist_id).await.unwrap().unwrap();
        assert_eq!(playlist.loop_count, 0);
    }

    #[tokio::test]
    async fn populate_assigns_contiguous_positions_across_blocks() {
        let records = vec![
            mk("v1", "sunset walk", 20, 10, 1),
            mk("v2", "sunset drive", 20, 10, 2),
            mk("v3", "city lights", 20, 10, 3),
        ];
        let specs = vec![
            ("sunset".to_string(), 2, FetchMode::Newest, Orientation::Mixed),
            ("city".to_string(), 1, FetchMode::Newest, Orientation::Mixed),
        ];
        let h = harness(records, &specs).await;
        let display_id = display_id_of(&h).await;
        let playlist_id = playlist_id_of(&h, &display_id).await;

        let created = h.engine.populate(&display_id, &playlist_id, 0).await.unwrap();
        assert_eq!(created, 3);

        let first = h.engine.next_for_display(&display_id).await.unwrap().unwrap();
        assert_eq!(first.timeline_position, 0);
        assert_eq!(first.video_id.as_str(), "v2");
    }

    #[tokio::test]
    async fn mark_played_is_idempotent_and_advances_position() {
        let records = vec![mk("v1", "sunset walk", 20, 10, 1)];
        let specs = vec![("sunset".to_string(), 1, FetchMode::Newest, Orientation::Mixed)];
        let h = harness(records, &specs).await;
        let display_id = display_id_of(&h).await;
        let playlist_id = playlist_id_of(&h, &display_id).await;
        h.engine.populate(&display_id, &playlist_id, 0).await.unwrap();

        let entry = h.engine.next_for_display(&display_id).await.unwrap().unwrap();
        h.engine.mark_played(&entry.entry_id).await.unwrap();
        h.engine.mark_played(&entry.entry_id).await.unwrap();

        let display = h.displays.get(&display_id).await.unwrap().unwrap();
        assert_eq!(display.timeline_position, 1);

        let block = h.blocks.get(&entry.block_id).await.unwrap().unwrap();
        assert_eq!(block.times_played, 1);
    }

    #[tokio::test]
    async fn orientation_filter_excludes_non_matching_records() {
        let records = vec![mk("v1", "sunset wide", 20, 10, 1), mk("v2", "sunset tall", 10, 20, 2)];
        let specs = vec![("sunset".to_string(), 5, FetchMode::Newest, Orientation::Wide)];
        let h = harness(records, &specs).await;
        let display_id = display_id_of(&h).await;
        let playlist_id = playlist_id_of(&h, &display_id).await;

        let created = h.engine.populate(&display_id, &playlist_id, 0).await.unwrap();
        assert_eq!(created, 1);
        let entry = h.engine.next_for_display(&display_id).await.unwrap().unwrap();
        assert_eq!(entry.video_id.as_str(), "v1");
    }

    #[tokio::test]
    async fn rollover_excludes_previously_played_videos_in_block() {
        let records = vec![mk("v1", "sunset walk", 20, 10, 1), mk("v2", "sunset drive", 20, 10, 2)];
        let specs = vec![("sunset".to_string(), 1, FetchMode::Newest, Orientation::Mixed)];
        let h = harness(records, &specs).await;
        let display_id = display_id_of(&h).await;
        let playlist_id = playlist_id_of(&h, &display_id).await;
        h.engine.populate(&display_id, &playlist_id, 0).await.unwrap();

        let first = h.engine.next_for_display(&display_id).await.unwrap().unwrap();
        assert_eq!(first.video_id.as_str(), "v2");
        h.engine.mark_played(&first.entry_id).await.unwrap();

        let outcome = h.engine.rollover(&display_id).await.unwrap().unwrap();
        assert_eq!(outcome, RolloverOutcome::Populated { entries_created: 1 });

        let second = h.engine.next_for_display(&display_id).await.unwrap().unwrap();
        assert_eq!(second.video_id.as_str(), "v1");
        assert_eq!(second.loop_iteration, 1);

        let playlist = h.playlists.get(&playlist_id).await.unwrap().unwrap();
        assert_eq!(playlist.loop_count, 1);
    }

    #[tokio::test]
    async fn rollover_with_exhausted_catalog_returns_empty_without_infinite_loop() {
        let records = vec![mk("v1", "sunset walk", 20, 10, 1)];
        let specs = vec![("sunset".to_string(), 1, FetchMode::Newest, Orientation::Mixed)];
        let h = harness(records, &specs).await;
        let display_id = display_id_of(&h).await;
        let playlist_id = playlist_id_of(&h, &display_id).await;
        h.engine.populate(&display_id, &playlist_id, 0).await.unwrap();

        let entry = h.engine.next_for_display(&display_id).await.unwrap().unwrap();
        h.engine.mark_played(&entry.entry_id).await.unwrap();

        let outcome = h.engine.rollover(&display_id).await.unwrap().unwrap();
        assert_eq!(outcome, RolloverOutcome::Empty);
        assert!(h.engine.next_for_display(&display_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn next_with_rollover_transparently_rolls_over_when_exhausted() {
        let records = vec![mk("v1", "sunset walk", 20, 10, 1), mk("v2", "sunset drive", 20, 10, 2)];
        let specs = vec![("sunset".to_string(), 1, FetchMode::Newest, Orientation::Mixed)];
        let h = harness(records, &specs).await;
        let display_id = display_id_of(&h).await;
        let playlist_id = playlist_id_of(&h, &display_id).await;
        h.engine.populate(&display_id, &playlist_id, 0).await.unwrap();

        let entry = h.engine.next_for_display(&display_id).await.unwrap().unwrap();
        h.engine.mark_played(&entry.entry_id).await.unwrap();

        let next = h.engine.next_with_rollover(&display_id).await.unwrap().unwrap();
        assert_eq!(next.loop_iteration, 1);
    }

    #[tokio::test]
    async fn reset_blocks_to_target_only_trims_never_adds() {
        let records = vec![
            mk("v1", "sunset a", 20, 10, 1),
            mk("v2", "sunset b", 20, 10, 2),
            mk("v3", "sunset c", 20, 10, 3),
        ];
        let specs = vec![("sunset".to_string(), 3, FetchMode::Newest, Orientation::Mixed)];
        let h = harness(records, &specs).await;
        let display_id = display_id_of(&h).await;
        let playlist_id = playlist_id_of(&h, &display_id).await;
        h.engine.populate(&display_id, &playlist_id, 0).await.unwrap();

        let block_id = h.blocks.list_for_playlist(&playlist_id).await.unwrap()[0].id.clone();
        h.blocks.set_video_count(&block_id, 1).await.unwrap();

        h.engine.reset_blocks_to_target(&display_id, &playlist_id).await.unwrap();

        let mut remaining = Vec::new();
        while let Some(entry) = h.engine.next_for_display(&display_id).await.unwrap() {
            h.engine.mark_played(&entry.entry_id).await.unwrap();
            remaining.push(entry);
        }
        assert_eq!(remaining.len(), 1);
        // The lowest timeline_position (newest video, v3) must survive the
        // trim; the higher, not-yet-due positions are the ones trimmed away.
        assert_eq!(remaining[0].timeline_position, 0);
        assert_eq!(remaining[0].video_id.as_str(), "v3");
    }
}
