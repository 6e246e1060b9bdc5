//! Integration tests for the content engine.
//!
//! These drive the engine through its public handle against the mock swarm,
//! covering deduplicated acquisition, session reference counting, delayed
//! eviction and teardown. Timing tests run on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use futures::future::join_all;
use streambox_core::engine::{ContentEngineHandle, ContentStatus, SessionEnd, spawn_content_engine};
use streambox_core::settings::{EngineSettings, SettingsStore, SettingsUpdate};
use streambox_core::swarm::SwarmError;
use streambox_core::swarm::test_mocks::{MockContent, MockSwarm};
use streambox_core::{InfoHash, StreamboxError};
use tokio::time::sleep;

/// Test fixture for engine integration tests using the public API.
struct EngineTestFixture {
    handle: ContentEngineHandle,
    swarm: MockSwarm,
    settings: Arc<SettingsStore>,
}

impl EngineTestFixture {
    /// Engine over a swarm that knows the test movie, 30s grace period.
    fn new() -> Self {
        Self::with_swarm(movie_swarm(), EngineSettings::default())
    }

    fn with_swarm(swarm: MockSwarm, settings: EngineSettings) -> Self {
        let settings = Arc::new(SettingsStore::in_memory(settings));
        let handle = spawn_content_engine(Arc::new(swarm.clone()), settings.clone());
        Self {
            handle,
            swarm,
            settings,
        }
    }

    async fn is_loaded(&self, info_hash: InfoHash) -> bool {
        self.handle.lookup(info_hash).await.unwrap().is_some()
    }
}

fn movie_hash() -> InfoHash {
    InfoHash::new([1u8; 20])
}

fn movie_uri() -> String {
    MockSwarm::magnet_for(movie_hash())
}

fn movie_swarm() -> MockSwarm {
    MockSwarm::new().with_content(
        movie_hash(),
        MockContent::folder(
            "Test Movie",
            vec![
                ("movie.mp4", Bytes::from(vec![7u8; 1000])),
                ("readme.txt", Bytes::from_static(b"hello")),
            ],
        ),
    )
}

fn settings_with_grace(seconds: u64) -> EngineSettings {
    EngineSettings {
        cleanup_delay_seconds: seconds,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_acquire_builds_content_handle() {
    let fixture = EngineTestFixture::new();

    let content = fixture.handle.acquire(&movie_uri()).await.unwrap();
    assert_eq!(content.info_hash(), movie_hash());
    assert_eq!(content.name(), "Test Movie");
    assert_eq!(content.files().len(), 2);
    assert_eq!(content.main_video_index(), Some(0));

    let options = fixture.swarm.last_options().unwrap();
    assert_eq!(options.max_connections, 55);
    assert_eq!(options.download_limit, None);
}

#[tokio::test]
async fn test_cached_content_skips_swarm() {
    let fixture = EngineTestFixture::new();

    let first = fixture.handle.acquire(&movie_uri()).await.unwrap();
    // Same content named by its uppercase hex hash
    let second = fixture
        .handle
        .acquire(&movie_hash().to_hex().to_uppercase())
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fixture.swarm.add_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_acquires_share_one_fetch() {
    let swarm = movie_swarm().with_metadata_delay(Duration::from_secs(2));
    let fixture = EngineTestFixture::with_swarm(swarm, EngineSettings::default());

    let uri = movie_uri();
    let results = join_all((0..16).map(|_| fixture.handle.acquire(&uri))).await;

    assert_eq!(fixture.swarm.add_calls(), 1);
    let handles: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
}

#[tokio::test]
async fn test_invalid_identifier_never_reaches_swarm() {
    let fixture = EngineTestFixture::new();

    for input in ["", "not-a-hash", "magnet:?dn=nothing", "http://example.com"] {
        let result = fixture.handle.acquire(input).await;
        assert!(matches!(
            result,
            Err(StreamboxError::InvalidIdentifier { .. })
        ));
    }
    assert_eq!(fixture.swarm.add_calls(), 0);
}

#[tokio::test]
async fn test_failed_acquisition_is_not_cached() {
    let swarm = movie_swarm().with_add_failure(SwarmError::Metadata {
        reason: "tracker refused".to_string(),
    });
    let fixture = EngineTestFixture::with_swarm(swarm, EngineSettings::default());

    let failed = fixture.handle.acquire(&movie_uri()).await;
    assert!(matches!(failed, Err(StreamboxError::Swarm(_))));
    assert!(failed.unwrap_err().is_retryable());
    assert!(matches!(
        fixture.handle.status(movie_hash()).await.unwrap(),
        ContentStatus::NotFound
    ));

    fixture.swarm.clear_add_failure();
    assert!(fixture.handle.acquire(&movie_uri()).await.is_ok());
    assert_eq!(fixture.swarm.add_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_metadata_timeout() {
    let fixture = EngineTestFixture::with_swarm(
        MockSwarm::new(),
        EngineSettings {
            metadata_timeout_seconds: 5,
            ..Default::default()
        },
    );
    let unknown = MockSwarm::magnet_for(InfoHash::new([0xee; 20]));

    let result = fixture.handle.acquire(&unknown).await;
    match result {
        Err(StreamboxError::MetadataTimeout { timeout, .. }) => {
            assert_eq!(timeout, Duration::from_secs(5));
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    // The pending entry is gone, so the next call starts a fresh fetch
    assert!(matches!(
        fixture.handle.status(InfoHash::new([0xee; 20])).await.unwrap(),
        ContentStatus::NotFound
    ));
    let _ = fixture.handle.acquire(&unknown).await;
    assert_eq!(fixture.swarm.add_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_connecting_then_ready() {
    let swarm = movie_swarm().with_metadata_delay(Duration::from_secs(3));
    let fixture = EngineTestFixture::with_swarm(swarm, EngineSettings::default());

    assert!(matches!(
        fixture.handle.status(movie_hash()).await.unwrap(),
        ContentStatus::NotFound
    ));

    let handle = fixture.handle.clone();
    let uri = movie_uri();
    let acquiring = tokio::spawn(async move { handle.acquire(&uri).await });

    sleep(Duration::from_secs(1)).await;
    let status = fixture.handle.status(movie_hash()).await.unwrap();
    assert_eq!(status.label(), "connecting");

    acquiring.await.unwrap().unwrap();
    let status = fixture.handle.status(movie_hash()).await.unwrap();
    let summary = status.summary().unwrap();
    assert_eq!(status.label(), "ready");
    assert_eq!(summary.peers, 12);
    assert_eq!(summary.files.len(), 2);
    // Status is a pure lookup
    assert_eq!(fixture.swarm.add_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_content_evicted_after_grace_period() {
    let fixture = EngineTestFixture::new();

    let (_, session) = fixture.handle.open_session(&movie_uri()).await.unwrap();
    assert_eq!(fixture.handle.session_count(movie_hash()).await.unwrap(), 1);

    let outcome = fixture.handle.end_session(movie_hash(), session).await.unwrap();
    assert_eq!(outcome, SessionEnd::Removed { remaining: 0 });

    sleep(Duration::from_millis(29_900)).await;
    assert!(fixture.is_loaded(movie_hash()).await);

    sleep(Duration::from_millis(200)).await;
    assert!(!fixture.is_loaded(movie_hash()).await);

    sleep(Duration::from_millis(10)).await;
    assert_eq!(fixture.swarm.destroyed(), vec![(movie_hash(), true)]);
}

#[tokio::test(start_paused = true)]
async fn test_returning_viewer_cancels_eviction() {
    let fixture = EngineTestFixture::new();

    let (_, session) = fixture.handle.open_session(&movie_uri()).await.unwrap();
    fixture.handle.end_session(movie_hash(), session).await.unwrap();

    sleep(Duration::from_secs(10)).await;
    fixture.handle.start_session(movie_hash()).await.unwrap();

    sleep(Duration::from_secs(120)).await;
    assert!(fixture.is_loaded(movie_hash()).await);
    assert_eq!(fixture.handle.session_count(movie_hash()).await.unwrap(), 1);
    assert!(fixture.swarm.destroyed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restarted_grace_period_uses_latest_end() {
    let fixture = EngineTestFixture::new();

    let (_, first) = fixture.handle.open_session(&movie_uri()).await.unwrap();
    fixture.handle.end_session(movie_hash(), first).await.unwrap();

    sleep(Duration::from_secs(20)).await;
    let second = fixture.handle.start_session(movie_hash()).await.unwrap();
    fixture.handle.end_session(movie_hash(), second).await.unwrap();

    // The first timer would have fired at 30s
    sleep(Duration::from_secs(15)).await;
    assert!(fixture.is_loaded(movie_hash()).await);

    sleep(Duration::from_secs(16)).await;
    assert!(!fixture.is_loaded(movie_hash()).await);
}

#[tokio::test(start_paused = true)]
async fn test_end_session_is_idempotent() {
    let fixture = EngineTestFixture::new();

    let (_, kept) = fixture.handle.open_session(&movie_uri()).await.unwrap();
    let (_, ended) = fixture.handle.open_session(&movie_uri()).await.unwrap();
    assert_eq!(fixture.handle.session_count(movie_hash()).await.unwrap(), 2);

    let first = fixture
        .handle
        .end_session(movie_hash(), ended.clone())
        .await
        .unwrap();
    let again = fixture
        .handle
        .end_session(movie_hash(), ended.clone())
        .await
        .unwrap();
    let unknown_hash = fixture
        .handle
        .end_session(InfoHash::new([9u8; 20]), kept)
        .await
        .unwrap();

    assert_eq!(first, SessionEnd::Removed { remaining: 1 });
    assert_eq!(again, SessionEnd::NotFound);
    assert_eq!(unknown_hash, SessionEnd::NotFound);
    assert_eq!(fixture.handle.session_count(movie_hash()).await.unwrap(), 1);

    // The remaining viewer keeps the content alive
    sleep(Duration::from_secs(120)).await;
    assert!(fixture.is_loaded(movie_hash()).await);
}

#[tokio::test(start_paused = true)]
async fn test_unwatched_content_is_reclaimed() {
    let fixture = EngineTestFixture::with_swarm(movie_swarm(), settings_with_grace(10));

    fixture.handle.acquire(&movie_uri()).await.unwrap();
    let summary = fixture.handle.list_content().await.unwrap();
    assert!(summary[0].eviction_scheduled);
    let evicts_in = summary[0].evicts_at.unwrap() - Utc::now();
    assert!(evicts_in <= TimeDelta::seconds(10));
    assert!(evicts_in > TimeDelta::seconds(8));

    sleep(Duration::from_secs(11)).await;
    assert!(!fixture.is_loaded(movie_hash()).await);
}

#[tokio::test(start_paused = true)]
async fn test_returning_viewer_clears_eviction_deadline() {
    let fixture = EngineTestFixture::with_swarm(movie_swarm(), settings_with_grace(10));

    fixture.handle.acquire(&movie_uri()).await.unwrap();
    assert!(fixture.handle.list_content().await.unwrap()[0].evicts_at.is_some());

    fixture.handle.open_session(&movie_uri()).await.unwrap();
    let summary = fixture.handle.list_content().await.unwrap();
    assert!(!summary[0].eviction_scheduled);
    assert_eq!(summary[0].evicts_at, None);
}

#[tokio::test(start_paused = true)]
async fn test_zero_grace_period_evicts_on_next_tick() {
    let fixture = EngineTestFixture::with_swarm(movie_swarm(), settings_with_grace(0));

    let (_, session) = fixture.handle.open_session(&movie_uri()).await.unwrap();
    fixture.handle.end_session(movie_hash(), session).await.unwrap();

    sleep(Duration::from_millis(1)).await;
    assert!(!fixture.is_loaded(movie_hash()).await);
}

#[tokio::test(start_paused = true)]
async fn test_grace_period_follows_settings_updates() {
    let fixture = EngineTestFixture::new();
    fixture
        .settings
        .update(&SettingsUpdate {
            cleanup_delay_seconds: Some(5),
            ..Default::default()
        })
        .unwrap();

    let (_, session) = fixture.handle.open_session(&movie_uri()).await.unwrap();
    fixture.handle.end_session(movie_hash(), session).await.unwrap();

    sleep(Duration::from_secs(6)).await;
    assert!(!fixture.is_loaded(movie_hash()).await);
}

#[tokio::test(start_paused = true)]
async fn test_failed_destroy_still_removes_handle() {
    let swarm = movie_swarm().with_destroy_failure(SwarmError::Storage {
        reason: "disk busy".to_string(),
    });
    let fixture = EngineTestFixture::with_swarm(swarm, settings_with_grace(1));

    let (_, session) = fixture.handle.open_session(&movie_uri()).await.unwrap();
    fixture.handle.end_session(movie_hash(), session).await.unwrap();

    sleep(Duration::from_secs(2)).await;
    assert!(!fixture.is_loaded(movie_hash()).await);
    assert_eq!(fixture.swarm.destroyed().len(), 1);

    // The engine keeps serving after the failure
    fixture.handle.acquire(&movie_uri()).await.unwrap();
    assert_eq!(fixture.swarm.add_calls(), 2);
}

#[tokio::test]
async fn test_session_for_unloaded_content() {
    let fixture = EngineTestFixture::new();
    let hash = InfoHash::new([5u8; 20]);

    let session = fixture.handle.start_session(hash).await.unwrap();
    assert_eq!(fixture.handle.session_count(hash).await.unwrap(), 1);
    assert_eq!(
        fixture.handle.end_session(hash, session).await.unwrap(),
        SessionEnd::Removed { remaining: 0 }
    );
    assert_eq!(fixture.swarm.add_calls(), 0);
}

#[tokio::test]
async fn test_remove_purges_content() {
    let fixture = EngineTestFixture::new();
    fixture.handle.open_session(&movie_uri()).await.unwrap();

    assert!(fixture.handle.remove(movie_hash()).await.unwrap());
    assert!(!fixture.handle.remove(movie_hash()).await.unwrap());
    assert!(!fixture.is_loaded(movie_hash()).await);
    assert_eq!(fixture.handle.session_count(movie_hash()).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_tears_everything_down() {
    let fixture = EngineTestFixture::new();
    fixture.handle.open_session(&movie_uri()).await.unwrap();

    // Park one caller on content the swarm will never deliver
    let handle = fixture.handle.clone();
    let unknown = InfoHash::new([0xaa; 20]);
    let waiting = tokio::spawn(async move {
        handle.acquire(&MockSwarm::magnet_for(unknown)).await
    });
    while fixture.handle.status(unknown).await.unwrap().label() != "connecting" {
        tokio::task::yield_now().await;
    }

    fixture.handle.shutdown().await.unwrap();

    assert!(matches!(
        waiting.await.unwrap(),
        Err(StreamboxError::EngineShutdown)
    ));
    assert_eq!(fixture.swarm.destroyed(), vec![(movie_hash(), true)]);
    assert!(matches!(
        fixture.handle.lookup(movie_hash()).await,
        Err(StreamboxError::EngineShutdown)
    ));
}
