//! Integration tests for the playback session manager
//!
//! These drive real processes: fake players written as shell scripts and
//! found through the locator's search path, like a host with `aplay`.

#![cfg(unix)]

use crate::test_utils::{forward_to, next_outcome, shell_manager, write_fake_player};
use play_soundfile::audio::{PlaybackError, PlaybackOptions, Platform, SystemLocator};
use play_soundfile::player::{SessionManager, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

fn host_with_aplay(body: &str) -> (tempfile::TempDir, SessionManager) {
    let bin = tempdir().expect("tempdir");
    write_fake_player(bin.path(), "aplay", body);
    let locator = SystemLocator::for_platform(Platform::Other).with_search_path(bin.path().as_os_str());
    (bin, SessionManager::new(Arc::new(locator)))
}

#[tokio::test]
async fn test_aplay_exit_zero_is_success() {
    let (_bin, manager) = host_with_aplay("exit 0");
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = manager.start("int1", "/fixtures/test.wav", &PlaybackOptions::default(), forward_to(&tx));
    let outcome = next_outcome(&mut rx).await;

    assert_eq!(outcome.id, "int1");
    assert!(outcome.result.is_ok());
    assert_eq!(handle.state(), SessionState::Completed { success: true });
}

#[tokio::test]
async fn test_aplay_exit_one_is_runtime_error() {
    let (_bin, manager) = host_with_aplay("exit 1");
    let (tx, mut rx) = mpsc::unbounded_channel();

    manager.start("missing", "/fixtures/missing.wav", &PlaybackOptions::default(), forward_to(&tx));
    let outcome = next_outcome(&mut rx).await;

    match outcome.result {
        Err(PlaybackError::RuntimeExit { code }) => assert_eq!(code, 1),
        other => panic!("expected RuntimeExit(1), got {:?}", other),
    }
}

#[tokio::test]
async fn test_player_receives_path_from_recipe() {
    let (_bin, manager) = host_with_aplay("test \"$1\" = /fixtures/test.wav");
    let (tx, mut rx) = mpsc::unbounded_channel();

    manager.start("path", "/fixtures/test.wav", &PlaybackOptions::with_volume(0.5), forward_to(&tx));
    assert!(next_outcome(&mut rx).await.result.is_ok());
}

#[tokio::test]
async fn test_stop_all_twice_delivers_one_success() {
    let (_bin, manager) = host_with_aplay("exec sleep 30");
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = manager.start("long", "/fixtures/test.wav", &PlaybackOptions::default(), forward_to(&tx));
    assert_eq!(manager.active_count(), 1);

    manager.stop_all();
    manager.stop_all();

    let outcome = next_outcome(&mut rx).await;
    assert!(outcome.result.is_ok());
    assert_eq!(handle.state(), SessionState::Killed);

    let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(extra.is_err(), "callback fired twice");
}

#[tokio::test]
async fn test_many_concurrent_sessions_all_complete() {
    let manager = shell_manager("sleep 0.1; exit 0");
    let (tx, mut rx) = mpsc::unbounded_channel();

    for i in 0..8 {
        manager.start(format!("s{}", i), "/x.wav", &PlaybackOptions::default(), forward_to(&tx));
    }
    assert_eq!(manager.active_count(), 8);

    let mut seen = Vec::new();
    for _ in 0..8 {
        let outcome = next_outcome(&mut rx).await;
        assert!(outcome.result.is_ok());
        seen.push(outcome.id);
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 8);
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test]
async fn test_failed_resolution_does_not_poison_later_starts() {
    let bin = tempdir().expect("tempdir");
    let locator = SystemLocator::for_platform(Platform::Other).with_search_path(bin.path().as_os_str());
    let manager = SessionManager::new(Arc::new(locator));
    let (tx, mut rx) = mpsc::unbounded_channel();

    manager.start("first", "/x.wav", &PlaybackOptions::default(), forward_to(&tx));
    assert!(matches!(next_outcome(&mut rx).await.result, Err(PlaybackError::NoPlayerFound { .. })));

    // A player shows up later; the next start probes again
    write_fake_player(bin.path(), "mpg123", "exit 0");
    manager.start("second", "/x.wav", &PlaybackOptions::default(), forward_to(&tx));
    assert!(next_outcome(&mut rx).await.result.is_ok());
}
