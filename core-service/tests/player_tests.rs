//! End-to-end player behaviour on a scripted media host, on paused time.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::testing::{FakeMediaBackend, ManualAudioOutput, PlayBehavior, StreamScript};
use bridge_traits::{MediaCapabilities, StationDirectory};
use core_playback::PlaybackError;
use core_runtime::events::{
    NavigationEvent, RadioEvent, Receiver, TuningEvent, WatchdogEvent,
};
use core_service::{
    CoreConfig, EngineState, PlaybackConfig, RadioPlayer, ServiceError, StationId, StationRecord,
    TuningConfig,
};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

mock! {
    Directory {}

    #[async_trait]
    impl StationDirectory for Directory {
        async fn resolve_stream_url(&self, station_id: &str) -> BridgeResult<Option<String>>;
        async fn register_click(&self, station_id: &str) -> BridgeResult<()>;
    }
}

fn url(id: &str) -> String {
    format!("http://streams.test/{id}.mp3")
}

fn stations(ids: &[&str]) -> Vec<StationRecord> {
    ids.iter()
        .map(|id| StationRecord::new(*id, id.to_uppercase(), url(id)))
        .collect()
}

fn backend() -> FakeMediaBackend {
    FakeMediaBackend::new(MediaCapabilities::progressive_only())
}

fn config(backend: &FakeMediaBackend, autoplay: bool) -> CoreConfig {
    CoreConfig::builder()
        .media_backend(Arc::new(backend.clone()))
        .enable_tuning_effect(false)
        .enable_autoplay_on_new_stations(autoplay)
        .enable_click_registration(false)
        .event_buffer_size(512)
        .build()
        .unwrap()
}

fn player(config: CoreConfig) -> RadioPlayer {
    RadioPlayer::new(config, PlaybackConfig::default(), TuningConfig::default()).unwrap()
}

fn drain(rx: &mut Receiver<RadioEvent>) -> Vec<RadioEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[test]
fn construction_requires_a_runtime() {
    let backend = backend();
    let err = RadioPlayer::new(
        config(&backend, false),
        PlaybackConfig::default(),
        TuningConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ServiceError::InitializationFailed(_)));
}

#[tokio::test(start_paused = true)]
async fn auto_skip_halts_after_five_attempts() {
    let backend = backend();
    backend.set_default_script(StreamScript::fails_after_probe());
    let player = player(config(&backend, true));
    let mut rx = player.subscribe();

    let ids: Vec<String> = (0..10).map(|i| format!("s{i}")).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    assert_eq!(player.replace_stations(stations(&ids)).await.unwrap(), Some(0));

    wait(10_000).await;

    // The initial load plus five skips.
    let opened: Vec<String> = backend.playback_opens().into_iter().map(|(u, _)| u).collect();
    assert_eq!(opened, (0..6).map(|i| url(&format!("s{i}"))).collect::<Vec<_>>());

    let status = player.status();
    assert!(status.auto_skip_halted);
    assert_eq!(status.current_index, 5);
    assert_eq!(
        status.last_error.as_deref(),
        Some("No playable stations found in this area")
    );

    let events = drain(&mut rx);
    let halted = events
        .iter()
        .filter(|e| matches!(e, RadioEvent::Watchdog(WatchdogEvent::Halted { attempts: 5, .. })))
        .count();
    let scheduled = events
        .iter()
        .filter(|e| matches!(e, RadioEvent::Watchdog(WatchdogEvent::SkipScheduled { .. })))
        .count();
    assert_eq!(halted, 1);
    assert_eq!(scheduled, 5);

    // Nothing else happens until the candidate set changes.
    wait(5_000).await;
    assert_eq!(backend.playback_opens().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn next_skips_invalid_candidates_using_the_cache() {
    let backend = backend();
    backend.script(url("a"), StreamScript::unreachable());
    backend.script(url("c"), StreamScript::unreachable());
    let player = player(config(&backend, false));

    assert_eq!(
        player.replace_stations(stations(&["a", "b", "c"])).await.unwrap(),
        Some(1)
    );
    assert_eq!(backend.playback_opens().len(), 0);

    assert_eq!(player.next().await.unwrap(), Some(1));
    wait(500).await;

    let status = player.status();
    assert_eq!(status.state, EngineState::Playing);
    assert!(status.is_playing);
    assert_eq!(status.station_id, Some(StationId::from("b")));
    assert_eq!(backend.probe_count(&url("a")), 1);
    assert_eq!(backend.probe_count(&url("b")), 1);
    assert_eq!(backend.probe_count(&url("c")), 1);
}

#[tokio::test(start_paused = true)]
async fn previous_wraps_to_the_last_station() {
    let backend = backend();
    let player = player(config(&backend, false));
    player.replace_stations(stations(&["a", "b", "c"])).await.unwrap();

    assert_eq!(player.previous().await.unwrap(), Some(2));
    assert_eq!(player.status().current_index, 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_navigation_is_ignored() {
    let backend = backend();
    let player = player(config(&backend, false));
    player.replace_stations(stations(&["a", "b", "c"])).await.unwrap();

    let (first, second) = tokio::join!(player.next(), player.next());
    assert_eq!(first.unwrap(), Some(1));
    assert_eq!(second.unwrap(), None);

    wait(500).await;
    assert_eq!(backend.playback_opens().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn navigation_reports_loading_while_validating() {
    let backend = backend();
    let player = Arc::new(player(config(&backend, false)));
    player.replace_stations(stations(&["a", "b"])).await.unwrap();

    let task = {
        let player = Arc::clone(&player);
        tokio::spawn(async move { player.next().await })
    };
    wait(10).await;
    let status = player.status();
    assert!(status.is_validating);
    assert!(status.is_loading);

    assert_eq!(task.await.unwrap().unwrap(), Some(1));
    wait(500).await;
    let status = player.status();
    assert!(!status.is_loading);
    assert!(!status.is_validating);
    assert_eq!(status.state, EngineState::Playing);
}

#[tokio::test(start_paused = true)]
async fn select_station_searches_from_the_chosen_station() {
    let backend = backend();
    backend.script(url("c"), StreamScript::unreachable());
    let player = player(config(&backend, false));
    player.replace_stations(stations(&["a", "b", "c", "d"])).await.unwrap();

    assert_eq!(
        player.select_station(&StationId::from("c")).await.unwrap(),
        Some(3)
    );

    let err = player
        .select_station(&StationId::from("zz"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Playback(PlaybackError::StationNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn blocked_autoplay_waits_for_the_user() {
    let backend = backend();
    backend.set_default_script(StreamScript::healthy().with_play(PlayBehavior::RejectAutoplay));
    let player = player(config(&backend, true));

    player.replace_stations(stations(&["a", "b"])).await.unwrap();
    wait(2_000).await;

    let status = player.status();
    assert_eq!(status.state, EngineState::Blocked);
    assert!(status.last_error.is_none());
    assert_eq!(status.auto_skip_attempts, 0);
    assert_eq!(backend.playback_opens().len(), 1);

    // A user gesture retries the same station.
    backend.set_default_script(StreamScript::healthy());
    player.play().await.unwrap();
    wait(500).await;
    assert_eq!(player.status().state, EngineState::Playing);
    assert_eq!(backend.playback_opens().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn new_candidate_set_resets_retry_state() {
    let backend = backend();
    backend.set_default_script(StreamScript::fails_after_probe());
    backend.script(url("y0"), StreamScript::healthy());
    let player = player(config(&backend, true));

    player.replace_stations(stations(&["x0", "x1", "x2"])).await.unwrap();
    wait(600).await;
    assert_eq!(player.status().auto_skip_attempts, 1);

    assert_eq!(
        player.replace_stations(stations(&["y0", "y1"])).await.unwrap(),
        Some(0)
    );
    let status = player.status();
    assert_eq!(status.auto_skip_attempts, 0);
    assert!(!status.auto_skip_halted);
    assert_eq!(status.epoch.value(), 2);

    wait(2_000).await;
    // The skip scheduled for the old set never ran.
    let opened: Vec<String> = backend.playback_opens().into_iter().map(|(u, _)| u).collect();
    assert_eq!(opened, vec![url("x0"), url("y0")]);
    assert_eq!(player.status().state, EngineState::Playing);
}

#[tokio::test(start_paused = true)]
async fn new_epoch_revalidates_shared_stations() {
    let backend = backend();
    let player = player(config(&backend, false));

    player.replace_stations(stations(&["a", "b"])).await.unwrap();
    player.replace_stations(stations(&["a", "c"])).await.unwrap();

    assert_eq!(backend.probe_count(&url("a")), 2);
    assert_eq!(player.status().epoch.value(), 2);
}

#[tokio::test(start_paused = true)]
async fn identical_candidate_set_is_a_no_op() {
    let backend = backend();
    let player = player(config(&backend, false));

    player.replace_stations(stations(&["a", "b"])).await.unwrap();
    player.next().await.unwrap();
    let probes = backend.total_probes();

    assert_eq!(
        player.replace_stations(stations(&["a", "b"])).await.unwrap(),
        Some(1)
    );
    assert_eq!(backend.total_probes(), probes);
    assert_eq!(player.status().epoch.value(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_initial_selection_reports_region() {
    let backend = backend();
    backend.set_default_script(StreamScript::unreachable());
    let player = player(config(&backend, true));
    let mut rx = player.subscribe();

    assert_eq!(
        player.replace_stations(stations(&["a", "b", "c"])).await.unwrap(),
        None
    );
    let status = player.status();
    assert_eq!(
        status.last_error.as_deref(),
        Some("No playable stations found in this region")
    );
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, RadioEvent::Navigation(NavigationEvent::Exhausted { .. }))));

    wait(2_000).await;
    assert!(backend.playback_opens().is_empty());

    let err = player.next().await.unwrap_err();
    assert!(err.is_user_visible());
    assert_eq!(
        player.status().last_error.as_deref(),
        Some("No playable stations found")
    );
}

#[tokio::test(start_paused = true)]
async fn empty_candidate_set_selects_nothing() {
    let backend = backend();
    let player = player(config(&backend, true));

    assert_eq!(player.replace_stations(Vec::new()).await.unwrap(), None);
    assert_eq!(player.next().await.unwrap(), None);
    assert_eq!(player.status().candidate_count, 0);
    assert_eq!(backend.total_probes(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_url_is_resolved_through_the_directory() {
    let backend = backend();
    backend.script(url("a"), StreamScript::fails_after_probe());
    let resolved = "http://streams.test/resolved.mp3";

    let mut directory = MockDirectory::new();
    directory
        .expect_resolve_stream_url()
        .times(1)
        .returning(move |_| Ok(Some(resolved.to_string())));
    directory.expect_register_click().times(2).returning(|_| Ok(()));

    let config = CoreConfig::builder()
        .media_backend(Arc::new(backend.clone()))
        .station_directory(Arc::new(directory))
        .enable_tuning_effect(false)
        .build()
        .unwrap();
    let player = player(config);

    let candidates = vec![
        StationRecord::new("a", "A", url("a")),
        StationRecord::new("b", "B", ""),
    ];
    player.replace_stations(candidates).await.unwrap();
    wait(3_000).await;

    let opened: Vec<String> = backend.playback_opens().into_iter().map(|(u, _)| u).collect();
    assert_eq!(opened, vec![url("a"), resolved.to_string()]);
    let status = player.status();
    assert_eq!(status.state, EngineState::Playing);
    assert_eq!(status.current_index, 1);
    assert_eq!(status.auto_skip_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn transport_controls() {
    let backend = backend();
    let player = player(config(&backend, false));
    player.replace_stations(stations(&["a", "b"])).await.unwrap();

    player.toggle_play_pause().await.unwrap();
    wait(500).await;
    assert_eq!(player.status().state, EngineState::Playing);

    player.toggle_play_pause().await.unwrap();
    assert_eq!(player.status().state, EngineState::Paused);

    player.set_volume(0.3).unwrap();
    let err = player.set_volume(1.5).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Playback(PlaybackError::InvalidVolume(_))
    ));

    player.toggle_play_pause().await.unwrap();
    wait(500).await;
    assert_eq!(player.status().state, EngineState::Playing);
    assert_eq!(backend.playback_volume(), Some(0.3));
}

#[tokio::test(start_paused = true)]
async fn toggle_while_loading_pauses_without_reloading() {
    let backend = backend();
    let player = player(config(&backend, false));
    player.replace_stations(stations(&["a", "b"])).await.unwrap();

    player.toggle_play_pause().await.unwrap();
    assert_eq!(player.status().state, EngineState::Loading);

    player.toggle_play_pause().await.unwrap();
    assert_eq!(player.status().state, EngineState::Paused);

    // The stream becoming ready later does not resume it.
    wait(500).await;
    assert_eq!(player.status().state, EngineState::Paused);
    assert_eq!(backend.playback_opens().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn user_navigation_cancels_a_pending_auto_skip() {
    let backend = backend();
    backend.script(url("a"), StreamScript::fails_after_probe());
    let player = player(config(&backend, true));

    assert_eq!(
        player
            .replace_stations(stations(&["a", "b", "c", "d", "e"]))
            .await
            .unwrap(),
        Some(0)
    );
    wait(600).await;
    assert_eq!(player.status().auto_skip_attempts, 1);

    assert_eq!(
        player.select_station(&StationId::from("d")).await.unwrap(),
        Some(3)
    );
    wait(2_000).await;

    let opened: Vec<String> = backend.playback_opens().into_iter().map(|(u, _)| u).collect();
    assert_eq!(opened, vec![url("a"), url("d")]);
    let status = player.status();
    assert_eq!(status.current_index, 3);
    assert_eq!(status.state, EngineState::Playing);
    assert_eq!(status.auto_skip_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn tuning_effect_runs_while_searching() {
    let backend = backend();
    let output = Arc::new(ManualAudioOutput::new(8_000));
    let config = CoreConfig::builder()
        .media_backend(Arc::new(backend.clone()))
        .audio_output(output.clone())
        .enable_autoplay_on_new_stations(false)
        .enable_click_registration(false)
        .event_buffer_size(512)
        .build()
        .unwrap();
    let player = player(config);
    player.replace_stations(stations(&["a", "b"])).await.unwrap();
    let mut rx = player.subscribe();

    player.next().await.unwrap();
    wait(2_000).await;
    assert_eq!(player.status().state, EngineState::Playing);
    assert!(output.is_connected());

    let tuning: Vec<RadioEvent> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, RadioEvent::Tuning(_)))
        .collect();
    assert!(matches!(
        tuning.first(),
        Some(RadioEvent::Tuning(TuningEvent::Started { .. }))
    ));
    assert_eq!(tuning.last(), Some(&RadioEvent::Tuning(TuningEvent::Disposed)));

    player.shutdown();
    assert!(!output.is_connected());
    assert_eq!(player.status().state, EngineState::Idle);
    assert_eq!(backend.live_playback_sources(), 0);
}
