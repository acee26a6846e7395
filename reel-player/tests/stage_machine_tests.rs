//! Stage machine tests through the engine handle
//!
//! Every test runs on paused tokio time: settle delays, hook auto-advance
//! and audio ramps elapse virtually.

mod helpers;

use helpers::{run_to_ready, sample_dataset, spawn_engine, stock_fetcher, FakeFetcher};
use reel_common::{ReelEvent, Stage};
use reel_player::config::ShowConfig;
use reel_player::loader::{FetchEvent, FetchedAsset};
use reel_player::Error;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

fn drain_events(rx: &mut broadcast::Receiver<ReelEvent>) -> Vec<ReelEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn stage_changes(events: &[ReelEvent]) -> Vec<(Stage, Option<usize>)> {
    events
        .iter()
        .filter_map(|e| match e {
            ReelEvent::StageChanged {
                stage, slide_index, ..
            } => Some((*stage, *slide_index)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_full_walkthrough_to_dashboard() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;

    assert_eq!(handle.snapshot().await.unwrap().stage, Stage::Password);

    let ready = run_to_ready(handle).await;
    assert_eq!(ready.progress, 100.0);
    assert!(ready.dataset_ready);
    assert!(ready.loading_complete);

    let hook = handle.start().await.unwrap();
    assert_eq!(hook.stage, Stage::Hook);
    assert_eq!(hook.segment_id.as_deref(), Some("intro"));
    assert!(hook.hook_message.unwrap().contains("ordinary Tuesday"));

    let slides = handle.skip().await.unwrap();
    assert_eq!(slides.stage, Stage::Slides);
    assert_eq!(slides.slide_index, Some(0));
    assert_eq!(slides.segment_id.as_deref(), Some("intro"));

    let s = handle.advance().await.unwrap();
    assert_eq!((s.slide_index, s.segment_id.as_deref()), (Some(1), Some("stats")));
    let s = handle.advance().await.unwrap();
    assert_eq!((s.slide_index, s.segment_id.as_deref()), (Some(2), Some("love")));

    let done = handle.advance().await.unwrap();
    assert_eq!(done.stage, Stage::Dashboard);
    assert_eq!(done.slide_index, None);

    // Extra advances are absorbed
    let again = handle.advance().await.unwrap();
    assert_eq!(again.stage, Stage::Dashboard);
    assert_eq!(engine.shared.get_stage().await, Stage::Dashboard);
}

#[tokio::test(start_paused = true)]
async fn test_advance_count_enters_dashboard_exactly_once() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;
    run_to_ready(handle).await;
    handle.start().await.unwrap();
    handle.skip().await.unwrap();

    let mut events = engine.shared.subscribe_events();
    for _ in 0..3 {
        handle.advance().await.unwrap();
    }
    handle.advance().await.unwrap();

    let dashboards = stage_changes(&drain_events(&mut events))
        .into_iter()
        .filter(|(stage, _)| *stage == Stage::Dashboard)
        .count();
    assert_eq!(dashboards, 1);
}

#[tokio::test(start_paused = true)]
async fn test_hook_auto_advances_after_duration() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;
    run_to_ready(handle).await;
    handle.start().await.unwrap();

    sleep(Duration::from_millis(5900)).await;
    assert_eq!(handle.snapshot().await.unwrap().stage, Stage::Hook);

    sleep(Duration::from_millis(200)).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.stage, Stage::Slides);
    assert_eq!(snap.slide_index, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_skip_cancels_hook_timer() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;
    run_to_ready(handle).await;
    handle.start().await.unwrap();

    sleep(Duration::from_secs(1)).await;
    let mut events = engine.shared.subscribe_events();
    handle.skip().await.unwrap();
    let advanced = handle.advance().await.unwrap();
    assert_eq!(advanced.slide_index, Some(1));

    // Well past the original auto-advance deadline
    sleep(Duration::from_secs(10)).await;

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.stage, Stage::Slides);
    assert_eq!(snap.slide_index, Some(1), "no stale auto-advance");

    let changes = stage_changes(&drain_events(&mut events));
    assert_eq!(
        changes,
        vec![(Stage::Slides, Some(0)), (Stage::Slides, Some(1))],
        "exactly one transition into slides"
    );
}

#[tokio::test(start_paused = true)]
async fn test_loading_scenario_progress_then_ready_after_settle() {
    let fetcher = FakeFetcher::new();
    let video = fetcher.driven("/bg-video.mp4");
    let track = fetcher.driven("/music-intro.mp3");
    fetcher.respond_json("/data.json", &sample_dataset());

    let engine = spawn_engine(&ShowConfig::default(), fetcher);
    let handle = &engine.handle;
    let mut events = engine.shared.subscribe_events();

    assert_eq!(handle.authenticate().await.unwrap().stage, Stage::Loading);

    video
        .send(FetchEvent::Progress {
            received: 500,
            total: Some(1000),
        })
        .unwrap();
    sleep(Duration::from_millis(10)).await;
    let snap = handle.snapshot().await.unwrap();
    assert!((snap.progress - 45.0).abs() < 1e-9, "got {}", snap.progress);

    track.send(FetchEvent::Failed("network error".into())).unwrap();
    video
        .send(FetchEvent::Complete(FetchedAsset {
            bytes: vec![0; 1000],
            content_type: Some("video/mp4".into()),
        }))
        .unwrap();
    sleep(Duration::from_millis(10)).await;

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.progress, 100.0);
    assert_eq!(snap.assets_completed, 2);
    assert_eq!(snap.stage, Stage::Loading, "settle delay still pending");

    sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.snapshot().await.unwrap().stage, Stage::Loading);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.snapshot().await.unwrap().stage, Stage::Ready);

    let events = drain_events(&mut events);
    let complete: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ReelEvent::LoadingComplete { resolved, failed, .. } => Some((*resolved, *failed)),
            _ => None,
        })
        .collect();
    assert_eq!(complete, vec![(1, 1)]);
    assert!(events
        .iter()
        .any(|e| matches!(e, ReelEvent::AssetFailed { source_ref, .. } if source_ref == "/music-intro.mp3")));
}

#[tokio::test(start_paused = true)]
async fn test_skip_during_settle_enters_ready_once() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;
    let mut events = engine.shared.subscribe_events();

    handle.authenticate().await.unwrap();
    // Let the preload finish without reaching the settle deadline
    sleep(Duration::from_millis(50)).await;
    assert!(handle.snapshot().await.unwrap().loading_complete);

    let snap = handle.skip().await.unwrap();
    assert_eq!(snap.stage, Stage::Ready);

    sleep(Duration::from_secs(2)).await;
    let readies = stage_changes(&drain_events(&mut events))
        .into_iter()
        .filter(|(stage, _)| *stage == Stage::Ready)
        .count();
    assert_eq!(readies, 1, "settle timer must not fire after skip");
}

#[tokio::test(start_paused = true)]
async fn test_missing_dataset_stalls_at_loading() {
    let fetcher = FakeFetcher::new();
    fetcher.respond("/bg-video.mp4", &[1u8; 10], "video/mp4");
    fetcher.respond("/music-intro.mp3", &[1u8; 10], "audio/mpeg");
    fetcher.fail("/data.json", "HTTP status 500");

    let engine = spawn_engine(&ShowConfig::default(), fetcher);
    let handle = &engine.handle;
    let mut events = engine.shared.subscribe_events();

    handle.authenticate().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.stage, Stage::Loading);
    assert!(snap.loading_complete);
    assert!(!snap.dataset_ready);
    assert!(snap.stalled.unwrap().contains("dataset unavailable"));

    // Triggers cannot push past the stall
    assert_eq!(handle.skip().await.unwrap().stage, Stage::Loading);
    assert_eq!(handle.start().await.unwrap().stage, Stage::Loading);

    assert!(drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, ReelEvent::Stalled { stage: Stage::Loading, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_dataset_stalls() {
    let fetcher = stock_fetcher();
    fetcher.respond("/data.json", b"{ not json", "application/json");

    let engine = spawn_engine(&ShowConfig::default(), fetcher);
    engine.handle.authenticate().await.unwrap();
    sleep(Duration::from_secs(2)).await;

    let snap = engine.handle.snapshot().await.unwrap();
    assert_eq!(snap.stage, Stage::Loading);
    assert!(snap.stalled.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_triggers_out_of_stage_are_no_ops() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;

    for snap in [
        handle.start().await.unwrap(),
        handle.skip().await.unwrap(),
        handle.advance().await.unwrap(),
    ] {
        assert_eq!(snap.stage, Stage::Password);
    }

    run_to_ready(handle).await;
    assert_eq!(handle.authenticate().await.unwrap().stage, Stage::Ready);
    assert_eq!(handle.advance().await.unwrap().stage, Stage::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_loading_starts_only_after_authentication() {
    let fetcher = stock_fetcher();
    let engine = spawn_engine(&ShowConfig::default(), fetcher);
    sleep(Duration::from_secs(1)).await;

    let snap = engine.handle.snapshot().await.unwrap();
    assert_eq!(snap.stage, Stage::Password);
    assert_eq!(snap.progress, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_backgrounds_and_audio_use_resolved_assets() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;
    run_to_ready(handle).await;

    let intro_audio = engine.handle.assets().resolve("/music-intro.mp3");
    assert!(intro_audio.starts_with("/assets/"));

    let hook = handle.start().await.unwrap();
    assert!(hook.background.unwrap().starts_with("/assets/"));
    assert_eq!(hook.audio_target.as_deref(), Some(intro_audio.as_str()));

    // Slides start on the same track: no second ramp
    handle.skip().await.unwrap();
    sleep(Duration::from_secs(6)).await;
    assert_eq!(engine.output.played(), vec![intro_audio.clone()]);

    // Unpreloaded segment media falls back to the remote reference
    let stats = handle.advance().await.unwrap();
    assert_eq!(stats.background.as_deref(), Some("/bg-stats.mp4"));
    assert_eq!(stats.audio_target.as_deref(), Some("/music-stats.mp3"));

    sleep(Duration::from_secs(3)).await;
    assert_eq!(
        engine.output.played(),
        vec![intro_audio, "/music-stats.mp3".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_celebrates_and_retargets_with_intro_fade() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;
    run_to_ready(handle).await;

    let mut events = engine.shared.subscribe_events();
    handle.start().await.unwrap();
    let events = drain_events(&mut events);

    assert!(events.iter().any(|e| matches!(e, ReelEvent::Celebrate { .. })));
    let fade = events.iter().find_map(|e| match e {
        ReelEvent::AudioTargetChanged { fade_ms, .. } => Some(*fade_ms),
        _ => None,
    });
    assert_eq!(fade, Some(5000));
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_silences_audio_when_not_kept() {
    let mut config = ShowConfig::default();
    config.dashboard.keep_audio = false;

    let engine = spawn_engine(&config, stock_fetcher());
    let handle = &engine.handle;
    run_to_ready(handle).await;
    handle.start().await.unwrap();
    handle.skip().await.unwrap();
    for _ in 0..3 {
        handle.advance().await.unwrap();
    }

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.stage, Stage::Dashboard);
    assert_eq!(snap.audio_target, None);
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_keeps_last_track_by_default() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    let handle = &engine.handle;
    run_to_ready(handle).await;
    handle.start().await.unwrap();
    handle.skip().await.unwrap();
    for _ in 0..3 {
        handle.advance().await.unwrap();
    }

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.stage, Stage::Dashboard);
    assert_eq!(snap.audio_target.as_deref(), Some("/music-love.mp3"));
}

#[tokio::test(start_paused = true)]
async fn test_stopped_engine_reports_error() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    engine.task.abort();
    let _ = engine.task.await;

    assert!(matches!(
        engine.handle.snapshot().await,
        Err(Error::EngineStopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dataset_reaches_shared_state() {
    let engine = spawn_engine(&ShowConfig::default(), stock_fetcher());
    assert!(engine.shared.get_dataset().await.is_none());
    run_to_ready(&engine.handle).await;

    let dataset = engine.shared.get_dataset().await.expect("dataset mirrored");
    assert_eq!(dataset.meta.total_messages, 4);
    assert_eq!(engine.shared.get_stage().await, Stage::Ready);
}
