// src/player/run_loop.rs
use super::state::{ActiveSessionSet, CompletionEvent, SessionOutcome};
use super::PLAYER_LOG_TARGET;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Delivers session results one at a time.
///
/// Each event first leaves the active set, then its state turns terminal and
/// only then does the callback run, so callbacks never overlap and a session
/// can never complete twice.
pub(crate) async fn run_completion_loop(
    active: Arc<Mutex<ActiveSessionSet>>,
    mut events_rx: mpsc::UnboundedReceiver<CompletionEvent>,
) {
    info!(target: PLAYER_LOG_TARGET, "Completion loop started.");

    while let Some(event) = events_rx.recv().await {
        if let Some(serial) = event.serial {
            let removed = active.lock().remove_if_current(&event.id, serial);
            if !removed {
                // stop/stop_all already took it out of the set
                trace!(target: PLAYER_LOG_TARGET, session_id = %event.id, "Session was no longer in the active set.");
            }
        }

        let terminal = event.terminal_state();
        *event.state.lock() = terminal;

        match &event.result {
            Ok(()) => info!(target: PLAYER_LOG_TARGET, session_id = %event.id, state = ?terminal, "Playback session finished."),
            Err(e) => warn!(target: PLAYER_LOG_TARGET, session_id = %event.id, "Playback session failed: {}", e),
        }

        let CompletionEvent { id, result, callback, .. } = event;
        let session_id = id.clone();
        let delivered = panic::catch_unwind(AssertUnwindSafe(move || callback(SessionOutcome { id, result })));
        if delivered.is_err() {
            error!(target: PLAYER_LOG_TARGET, session_id = %session_id, "Completion callback panicked.");
        }
    }

    debug!(target: PLAYER_LOG_TARGET, "All completion senders dropped. Exiting completion loop.");
}
