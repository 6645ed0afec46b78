// src/player/session_task.rs

use crate::audio::PlaybackError;
use crate::player::state::{CompletionCallback, CompletionEvent, SharedState};
use crate::player::PLAYER_LOG_TARGET;
use std::io;
use std::process::ExitStatus;
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn, Instrument, Span};

/// Everything the watcher needs to report a session's end.
pub(crate) struct WatchedSession {
    pub id: String,
    pub serial: u64,
    pub state: SharedState,
    pub callback: CompletionCallback,
}

/// Maps the player's exit to a session result.
///
/// A status without an exit code means the process was ended by a signal,
/// which only happens when someone stopped it on purpose.
pub(crate) fn classify_exit(status: io::Result<ExitStatus>) -> Result<(), PlaybackError> {
    match status {
        Ok(status) => match status.code() {
            Some(0) | None => Ok(()),
            Some(code) => Err(PlaybackError::RuntimeExit { code }),
        },
        Err(e) => Err(PlaybackError::Process(e)),
    }
}

/// Spawns a Tokio task that waits for `child` to exit (or for a kill request)
/// and reports the outcome to the completion loop.
#[instrument(skip_all, fields(session_id = %session.id))]
pub(crate) fn spawn_session_watcher(
    mut child: Child,
    mut kill_rx: broadcast::Receiver<()>,
    session: WatchedSession,
    events_tx: mpsc::UnboundedSender<CompletionEvent>,
) -> JoinHandle<()> {
    debug!(target: PLAYER_LOG_TARGET, pid = ?child.id(), "Spawning watcher for player process.");
    tokio::spawn(async move {
        let WatchedSession { id, serial, state, callback } = session;

        let (result, killed) = tokio::select! {
            biased;
            status = child.wait() => (classify_exit(status), false),
            signal = kill_rx.recv() => match signal {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    info!(target: PLAYER_LOG_TARGET, session_id = %id, "Kill requested, terminating player process.");
                    if let Err(e) = child.start_kill() {
                        // Already exited between the select arms
                        trace!(target: PLAYER_LOG_TARGET, session_id = %id, "start_kill failed: {}", e);
                    }
                    match child.wait().await {
                        Ok(status) => debug!(target: PLAYER_LOG_TARGET, session_id = %id, "Killed player exited with {}.", status),
                        Err(e) => warn!(target: PLAYER_LOG_TARGET, session_id = %id, "Error waiting for killed player: {}", e),
                    }
                    (Ok(()), true)
                }
                Err(broadcast::error::RecvError::Closed) => {
                    trace!(target: PLAYER_LOG_TARGET, session_id = %id, "Kill channel closed, waiting for natural exit.");
                    (classify_exit(child.wait().await), false)
                }
            },
        };

        match &result {
            Ok(()) => debug!(target: PLAYER_LOG_TARGET, session_id = %id, killed, "Player process finished."),
            Err(e) => debug!(target: PLAYER_LOG_TARGET, session_id = %id, "Player process failed: {}", e),
        }

        let event = CompletionEvent {
            id,
            serial: Some(serial),
            state,
            result,
            killed,
            callback,
        };
        if let Err(e) = events_tx.send(event) {
            error!(target: PLAYER_LOG_TARGET, session_id = %e.0.id, "Completion loop is gone, dropping session result.");
        }
    }
    .instrument(Span::current()))
}
