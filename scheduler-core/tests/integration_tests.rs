//! Integration tests for the scheduler core services
//!
//! These exercise the catalog search, playlist manager, timeline engine,
//! and command queue together, end to end, against in-memory fakes.
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use scheduler_core::cache::CountCache;
use scheduler_core::clock::{Clock, ManualClock};
use scheduler_core::models::{
    CommandType, CreatePlaylistRequest, CreatorInfo, Display, FetchMode, MediaEncodings,
    NewBlockSpec, Orientation, VideoId, VideoRecord,
};
use scheduler_core::repository::block::fake::FakeBlockStore;
use scheduler_core::repository::catalog::fake::FakeCatalogStore;
use scheduler_core::repository::command::fake::FakeCommandStore;
use scheduler_core::repository::display::fake::FakeDisplayStore;
use scheduler_core::repository::history::fake::FakeHistoryStore;
use scheduler_core::repository::playlist::fake::FakePlaylistStore;
use scheduler_core::repository::timeline::fake::FakeTimelineStore;
use scheduler_core::repository::{BlockStore, CommandStore, DisplayStore, HistoryStore, PlaylistStore, TimelineStore};
use scheduler_core::service::{CatalogSearchService, DisplayLocks, PlaylistManager, RolloverOutcome, TimelineEngine};

fn video(id: &str, text: &str, w: i32, h: i32, ts: i64) -> VideoRecord {
    VideoRecord {
        video_id: VideoId::from_string(id.to_string()),
        creator: CreatorInfo {
            id: "creator-1".into(),
            username: "creator".into(),
            display_name: "Creator".into(),
        },
        text: text.to_string(),
        posted_at: Utc.timestamp_opt(ts, 0).unwrap(),
        permalink: format!("https://example.test/{id}"),
        width: w,
        height: h,
        encodings: MediaEncodings {
            source: format!("https://cdn.example.test/{id}/source.mp4"),
            md: None,
            thumbnail: None,
            gif: None,
        },
    }
}

/// A fully wired scheduler stack over in-memory fakes, standing in for
/// the Scheduling Store + Catalog Store of SPEC_FULL §1/§2.
struct Stack {
    engine: TimelineEngine,
    playlist_manager: PlaylistManager,
    commands: Arc<FakeCommandStore>,
    displays: Arc<FakeDisplayStore>,
}

fn build_stack(catalog_records: Vec<VideoRecord>, now: chrono::DateTime<Utc>) -> (Stack, scheduler_core::models::DisplayId) {
    let display = Display::new("lobby".to_string(), now);
    let display_id = display.id.clone();

    let displays = Arc::new(FakeDisplayStore::seeded(display));
    let playlists = Arc::new(FakePlaylistStore::new());
    let blocks = Arc::new(FakeBlockStore::new());
    let history: Arc<dyn HistoryStore> = Arc::new(FakeHistoryStore::new());
    let timeline: Arc<dyn TimelineStore> = Arc::new(FakeTimelineStore::new());
    let commands = Arc::new(FakeCommandStore::new());
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));

    let catalog_store: Arc<dyn scheduler_core::repository::CatalogStore> =
        Arc::new(FakeCatalogStore::new(catalog_records));
    let catalog_search = CatalogSearchService::new(
        catalog_store,
        CountCache::new(std::time::Duration::from_secs(3600)),
        2,
        30,
    );

    let playlist_manager = PlaylistManager::new(
        playlists.clone() as Arc<dyn PlaylistStore>,
        blocks.clone() as Arc<dyn BlockStore>,
        displays.clone() as Arc<dyn DisplayStore>,
        clock.clone(),
    );

    let engine = TimelineEngine::new(
        timeline,
        history,
        blocks as Arc<dyn BlockStore>,
        playlists as Arc<dyn PlaylistStore>,
        displays.clone() as Arc<dyn DisplayStore>,
        catalog_search,
        clock,
        DisplayLocks::new(),
    );

    (
        Stack {
            engine,
            playlist_manager,
            commands,
            displays,
        },
        display_id,
    )
}

/// S1. Single-block happy path: newest-mode block drains newest-first,
/// then rollover excludes every video played in the concluded loop.
#[tokio::test]
async fn s1_single_block_happy_path_then_rollover_excludes_played() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let records = vec![
        video("v1", "a sunset walk", 20, 10, 1),
        video("v2", "sunset drive", 20, 10, 2),
        video("v3", "sunset run", 20, 10, 3),
        video("v4", "sunset swim", 20, 10, 4),
        video("v5", "sunset dance", 20, 10, 5),
    ];
    let (stack, display_id) = build_stack(records, now);

    let playlist = stack
        .playlist_manager
        .create_playlist(CreatePlaylistRequest {
            display_id: display_id.clone(),
            name: "evening".to_string(),
            blocks: vec![NewBlockSpec {
                search_term: "sunset".to_string(),
                video_count: 3,
                fetch_mode: FetchMode::Newest,
                orientation: Orientation::Mixed,
            }],
        })
        .await
        .unwrap();
    stack.playlist_manager.activate_playlist(&display_id, &playlist.id).await.unwrap();
    stack.engine.activate(&display_id, &playlist.id).await.unwrap();

    // First poll: newest first (v5).
    let first = stack.engine.next_for_display(&display_id).await.unwrap().unwrap();
    assert_eq!(first.timeline_position, 0);
    assert_eq!(first.video_id.as_str(), "v5");
    stack.engine.mark_played(&first.entry_id).await.unwrap();

    let second = stack.engine.next_for_display(&display_id).await.unwrap().unwrap();
    assert_eq!(second.video_id.as_str(), "v4");
    stack.engine.mark_played(&second.entry_id).await.unwrap();

    let third = stack.engine.next_for_display(&display_id).await.unwrap().unwrap();
    assert_eq!(third.timeline_position, 2);
    assert_eq!(third.video_id.as_str(), "v3");
    stack.engine.mark_played(&third.entry_id).await.unwrap();

    // Fourth poll: exhausted, triggers rollover. v5/v4/v3 excluded by
    // history, so loop 1 starts at the newest remaining: v2.
    let next = stack.engine.next_with_rollover(&display_id).await.unwrap().unwrap();
    assert_eq!(next.loop_iteration, 1);
    assert_eq!(next.video_id.as_str(), "v2");

    let playlist = stack.playlist_manager.get_playlist(&playlist.id).await.unwrap();
    assert_eq!(playlist.loop_count, 1);
}

/// S2. Multi-block ordering: block A (newest) occupies the low
/// `timeline_position`s, block B (random, deduped) follows contiguously.
#[tokio::test]
async fn s2_multi_block_ordering_is_contiguous_by_block_order() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let records = vec![
        video("c1", "cat nap", 20, 10, 1),
        video("c2", "cat play", 20, 10, 2),
        video("d1", "dog walk", 20, 10, 3),
        video("d2", "dog fetch", 20, 10, 4),
    ];
    let (stack, display_id) = build_stack(records, now);

    let playlist = stack
        .playlist_manager
        .create_playlist(CreatePlaylistRequest {
            display_id: display_id.clone(),
            name: "pets".to_string(),
            blocks: vec![
                NewBlockSpec {
                    search_term: "cat".to_string(),
                    video_count: 2,
                    fetch_mode: FetchMode::Newest,
                    orientation: Orientation::Mixed,
                },
                NewBlockSpec {
                    search_term: "dog".to_string(),
                    video_count: 2,
                    fetch_mode: FetchMode::Random,
                    orientation: Orientation::Mixed,
                },
            ],
        })
        .await
        .unwrap();
    stack.playlist_manager.activate_playlist(&display_id, &playlist.id).await.unwrap();
    let created = stack.engine.populate(&display_id, &playlist.id, 0).await.unwrap();
    assert_eq!(created, 4);

    let blocks = stack.playlist_manager.get_blocks(&playlist.id).await.unwrap();
    let cat_block = &blocks[0];
    let dog_block = &blocks[1];

    let mut seen_dog_ids = std::collections::HashSet::new();
    for expected_position in 0..4i64 {
        let entry = stack.engine.next_for_display(&display_id).await.unwrap().unwrap();
        assert_eq!(entry.timeline_position, expected_position);
        if expected_position < 2 {
            assert_eq!(&entry.block_id, &cat_block.id);
            assert_eq!(entry.block_position, expected_position as i32);
        } else {
            assert_eq!(&entry.block_id, &dog_block.id);
            assert!(seen_dog_ids.insert(entry.video_id.clone()), "dog block must not repeat a video");
        }
        stack.engine.mark_played(&entry.entry_id).await.unwrap();
    }
    assert_eq!(seen_dog_ids.len(), 2);
}

/// S3. Orientation filter: a `tall` block only ever contributes entries
/// whose dimensions satisfy `height > width`.
#[tokio::test]
async fn s3_orientation_filter_limits_block_to_matching_universe() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let mut records = vec![
        video("t1", "city at night", 10, 20, 1),
        video("t2", "city skyline", 12, 22, 2),
        video("t3", "city rooftop", 9, 18, 3),
    ];
    for i in 0..7 {
        records.push(video(&format!("w{i}"), "city wide shot", 20, 10, 10 + i));
    }
    let (stack, display_id) = build_stack(records, now);

    let playlist = stack
        .playlist_manager
        .create_playlist(CreatePlaylistRequest {
            display_id: display_id.clone(),
            name: "city".to_string(),
            blocks: vec![NewBlockSpec {
                search_term: "city".to_string(),
                video_count: 5,
                fetch_mode: FetchMode::Newest,
                orientation: Orientation::Tall,
            }],
        })
        .await
        .unwrap();
    stack.playlist_manager.activate_playlist(&display_id, &playlist.id).await.unwrap();
    let created = stack.engine.populate(&display_id, &playlist.id, 0).await.unwrap();

    assert_eq!(created, 3);
    let mut count = 0;
    while let Some(entry) = stack.engine.next_for_display(&display_id).await.unwrap() {
        assert!(entry.video_payload.height > entry.video_payload.width);
        stack.engine.mark_played(&entry.entry_id).await.unwrap();
        count += 1;
    }
    assert_eq!(count, 3);
}

/// S4. Command delivery: FIFO order, exactly-once drain.
#[tokio::test]
async fn s4_commands_drain_fifo_and_exactly_once() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let (stack, display_id) = build_stack(vec![], now);

    stack.commands.enqueue(&display_id, CommandType::Pause, None, now).await.unwrap();
    stack
        .commands
        .enqueue(&display_id, CommandType::Seek, Some(serde_json::json!({"position": 12.5})), now)
        .await
        .unwrap();
    stack.commands.enqueue(&display_id, CommandType::Play, None, now).await.unwrap();

    let drained = stack.commands.drain(&display_id).await.unwrap();
    let kinds: Vec<CommandType> = drained.iter().map(|c| c.command_type).collect();
    assert_eq!(kinds, vec![CommandType::Pause, CommandType::Seek, CommandType::Play]);

    let second_drain = stack.commands.drain(&display_id).await.unwrap();
    assert!(second_drain.is_empty());
}

/// S5. Idempotent mark-played across a retried call: position advances
/// once and exactly one history entry is recorded.
#[tokio::test]
async fn s5_mark_played_replay_is_idempotent() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let records = vec![video("v1", "sunset walk", 20, 10, 1)];
    let (stack, display_id) = build_stack(records, now);

    let playlist = stack
        .playlist_manager
        .create_playlist(CreatePlaylistRequest {
            display_id: display_id.clone(),
            name: "set".to_string(),
            blocks: vec![NewBlockSpec {
                search_term: "sunset".to_string(),
                video_count: 1,
                fetch_mode: FetchMode::Newest,
                orientation: Orientation::Mixed,
            }],
        })
        .await
        .unwrap();
    stack.playlist_manager.activate_playlist(&display_id, &playlist.id).await.unwrap();
    stack.engine.populate(&display_id, &playlist.id, 0).await.unwrap();

    let entry = stack.engine.next_for_display(&display_id).await.unwrap().unwrap();
    stack.engine.mark_played(&entry.entry_id).await.unwrap();
    stack.engine.mark_played(&entry.entry_id).await.unwrap();
    stack.engine.mark_played(&entry.entry_id).await.unwrap();

    let display = stack.displays.get(&display_id).await.unwrap().unwrap();
    assert_eq!(display.timeline_position, entry.timeline_position + 1);
}

/// S6. A block whose catalog universe is smaller than its configured
/// count is exhausted over successive loops without ever reusing a
/// video or spinning the rollover indefinitely; `loop_count` still
/// advances on an empty population.
#[tokio::test]
async fn s6_block_exhausts_its_catalog_universe_over_loops() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let records = (0..6).map(|i| video(&format!("a{i}"), "aurora borealis", 20, 10, i)).collect();
    let (stack, display_id) = build_stack(records, now);

    let playlist = stack
        .playlist_manager
        .create_playlist(CreatePlaylistRequest {
            display_id: display_id.clone(),
            name: "nights".to_string(),
            blocks: vec![NewBlockSpec {
                search_term: "aurora".to_string(),
                video_count: 4,
                fetch_mode: FetchMode::Newest,
                orientation: Orientation::Mixed,
            }],
        })
        .await
        .unwrap();
    stack.playlist_manager.activate_playlist(&display_id, &playlist.id).await.unwrap();

    // Loop 0: 4 of 6 entries.
    let created = stack.engine.populate(&display_id, &playlist.id, 0).await.unwrap();
    assert_eq!(created, 4);
    while let Some(entry) = stack.engine.next_for_display(&display_id).await.unwrap() {
        stack.engine.mark_played(&entry.entry_id).await.unwrap();
    }

    // Loop 1: the 2 remaining.
    let outcome = stack.engine.rollover(&display_id).await.unwrap().unwrap();
    assert_eq!(outcome, RolloverOutcome::Populated { entries_created: 2 });
    while let Some(entry) = stack.engine.next_for_display(&display_id).await.unwrap() {
        stack.engine.mark_played(&entry.entry_id).await.unwrap();
    }

    // Loop 2: the block's catalog universe is fully exhausted.
    let outcome = stack.engine.rollover(&display_id).await.unwrap().unwrap();
    assert_eq!(outcome, RolloverOutcome::Empty);
    assert!(stack.engine.next_for_display(&display_id).await.unwrap().is_none());

    let playlist = stack.playlist_manager.get_playlist(&playlist.id).await.unwrap();
    assert_eq!(playlist.loop_count, 3);
}

/// Activation must provision `loop_iteration=0` directly rather than
/// relying on the rollover fallback in `next_with_rollover`, which is
/// reserved for loops that actually complete (§4.3.1, §4.3.4, S1).
#[tokio::test]
async fn activation_starts_at_loop_zero_without_counting_as_a_rollover() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let records = vec![video("v1", "sunset walk", 20, 10, 1)];
    let (stack, display_id) = build_stack(records, now);

    let playlist = stack
        .playlist_manager
        .create_playlist(CreatePlaylistRequest {
            display_id: display_id.clone(),
            name: "set".to_string(),
            blocks: vec![NewBlockSpec {
                search_term: "sunset".to_string(),
                video_count: 1,
                fetch_mode: FetchMode::Newest,
                orientation: Orientation::Mixed,
            }],
        })
        .await
        .unwrap();
    stack.playlist_manager.activate_playlist(&display_id, &playlist.id).await.unwrap();
    stack.engine.activate(&display_id, &playlist.id).await.unwrap();

    let entry = stack.engine.next_with_rollover(&display_id).await.unwrap().unwrap();
    assert_eq!(entry.loop_iteration, 0);

    let playlist = stack.playlist_manager.get_playlist(&playlist.id).await.unwrap();
    assert_eq!(playlist.loop_count, 0);
}

/// Property: at most one active playlist per display — activating a
/// second playlist deactivates the first.
#[tokio::test]
async fn at_most_one_active_playlist_per_display() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let (stack, display_id) = build_stack(vec![], now);

    let spec = |term: &str| CreatePlaylistRequest {
        display_id: display_id.clone(),
        name: term.to_string(),
        blocks: vec![NewBlockSpec {
            search_term: term.to_string(),
            video_count: 1,
            fetch_mode: FetchMode::Newest,
            orientation: Orientation::Mixed,
        }],
    };

    let first = stack.playlist_manager.create_playlist(spec("sunset")).await.unwrap();
    let second = stack.playlist_manager.create_playlist(spec("sunrise")).await.unwrap();

    stack.playlist_manager.activate_playlist(&display_id, &first.id).await.unwrap();
    stack.playlist_manager.activate_playlist(&display_id, &second.id).await.unwrap();

    let active = stack.playlist_manager.get_active_for_display(&display_id).await.unwrap().unwrap();
    assert_eq!(active.id, second.id);

    let first_reloaded = stack.playlist_manager.get_playlist(&first.id).await.unwrap();
    assert!(!first_reloaded.is_active);
}
