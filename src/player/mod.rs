//! Playback Session Manager: launches external players, tracks every
//! in-flight session and reports each one's end exactly once.

use crate::audio::{PlaybackError, PlaybackOptions, PlayerLocator, SystemLocator};
use parking_lot::Mutex;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, trace, warn};

mod run_loop;
mod session_task;
mod state;

pub use state::{CompletionCallback, SessionOutcome, SessionState};

use session_task::WatchedSession;
use state::{ActiveSession, ActiveSessionSet, CompletionEvent, SharedState};

pub(crate) const PLAYER_LOG_TARGET: &str = "play_soundfile::player";

/// Caller's view of one playback session.
///
/// Dropping the handle does not stop playback.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    state: SharedState,
    kill_tx: Option<broadcast::Sender<()>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Requests forced termination of the player. Fire-and-forget: the
    /// process may still be running when this returns. Killing a finished,
    /// already killed or never launched session does nothing.
    pub fn kill(&self) {
        let Some(kill_tx) = &self.kill_tx else {
            trace!(target: PLAYER_LOG_TARGET, session_id = %self.id, "Kill on a session that never launched, ignoring.");
            return;
        };
        if self.state().is_terminal() {
            trace!(target: PLAYER_LOG_TARGET, session_id = %self.id, "Kill on a finished session, ignoring.");
            return;
        }
        if let Err(e) = kill_tx.send(()) {
            trace!(target: PLAYER_LOG_TARGET, session_id = %self.id, "Failed to send kill signal (watcher likely done): {}", e);
        }
    }
}

struct Inner {
    locator: Arc<dyn PlayerLocator>,
    active: Arc<Mutex<ActiveSessionSet>>,
    next_serial: AtomicU64,
    events_tx: mpsc::UnboundedSender<CompletionEvent>,
    runtime: Handle,
}

/// Owns the active session set. Cheap to clone; clones share the same set.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("active_count", &self.active_count())
            .finish()
    }
}

impl SessionManager {
    /// Creates a manager resolving players through `locator`.
    ///
    /// Must be called from within a Tokio runtime: the completion loop is
    /// spawned here, and every later session runs on the same runtime.
    pub fn new(locator: Arc<dyn PlayerLocator>) -> Self {
        let runtime = Handle::current();
        let active = Arc::new(Mutex::new(ActiveSessionSet::default()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_loop::run_completion_loop(active.clone(), events_rx));

        SessionManager {
            inner: Arc::new(Inner {
                locator,
                active,
                next_serial: AtomicU64::new(1),
                events_tx,
                runtime,
            }),
        }
    }

    /// Manager probing the host for its player on every `start`.
    pub fn with_system_locator() -> Self {
        Self::new(Arc::new(SystemLocator::new()))
    }

    /// Starts playing `file` under correlation id `id`.
    ///
    /// Never fails synchronously: resolution, launch and runtime failures all
    /// arrive through `on_complete`, which always runs later on the
    /// completion loop, never inside this call. Callable from any thread; the
    /// player and its watcher run on the runtime the manager was created in.
    #[instrument(skip_all, fields(session_id = %id.as_ref(), file = %file.as_ref().display()))]
    pub fn start<I, P, F>(&self, id: I, file: P, options: &PlaybackOptions, on_complete: F) -> SessionHandle
    where
        I: AsRef<str>,
        P: AsRef<Path>,
        F: FnOnce(SessionOutcome) + Send + 'static,
    {
        let _runtime = self.inner.runtime.enter();
        let id = id.as_ref().to_string();
        let callback: CompletionCallback = Box::new(on_complete);
        let state: SharedState = Arc::new(Mutex::new(SessionState::Starting));

        if self.is_active(&id) {
            warn!(target: PLAYER_LOG_TARGET, "Session id already active, rejecting start.");
            return self.fail_early(id.clone(), state, PlaybackError::DuplicateSession(id), callback);
        }

        // Probing and fork/exec happen without the active set locked.
        let recipe = match self.inner.locator.resolve() {
            Ok(recipe) => recipe,
            Err(e) => return self.fail_early(id, state, e, callback),
        };

        let args = recipe.build_args(file.as_ref(), options);
        debug!(target: PLAYER_LOG_TARGET, executable = %recipe.executable, ?args, "Launching player.");

        let child = Command::new(recipe.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(source) => {
                let err = PlaybackError::Launch {
                    executable: recipe.executable,
                    source,
                };
                return self.fail_early(id, state, err, callback);
            }
        };

        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let (kill_tx, kill_rx) = broadcast::channel::<()>(1);
        {
            let mut active = self.inner.active.lock();
            if active.contains(&id) {
                drop(active);
                warn!(target: PLAYER_LOG_TARGET, "Session id became active while launching, killing the new player.");
                if let Err(e) = child.start_kill() {
                    trace!(target: PLAYER_LOG_TARGET, "start_kill on rejected player failed: {}", e);
                }
                return self.fail_early(id.clone(), state, PlaybackError::DuplicateSession(id), callback);
            }
            *state.lock() = SessionState::Running;
            active.insert(
                id.clone(),
                ActiveSession {
                    serial,
                    kill_tx: kill_tx.clone(),
                },
            );
        }

        info!(target: PLAYER_LOG_TARGET, executable = %recipe.executable, "Playback session running.");
        session_task::spawn_session_watcher(
            child,
            kill_rx,
            WatchedSession {
                id: id.clone(),
                serial,
                state: state.clone(),
                callback,
            },
            self.inner.events_tx.clone(),
        );

        SessionHandle {
            id,
            state,
            kill_tx: Some(kill_tx),
        }
    }

    /// Marks a session failed before any process ran and queues its callback.
    fn fail_early(&self, id: String, state: SharedState, err: PlaybackError, callback: CompletionCallback) -> SessionHandle {
        warn!(target: PLAYER_LOG_TARGET, session_id = %id, "Playback could not start: {}", err);
        *state.lock() = SessionState::Completed { success: false };

        let event = CompletionEvent {
            id: id.clone(),
            serial: None,
            state: state.clone(),
            result: Err(err),
            killed: false,
            callback,
        };
        if let Err(e) = self.inner.events_tx.send(event) {
            error!(target: PLAYER_LOG_TARGET, session_id = %e.0.id, "Completion loop is gone, dropping session result.");
        }

        SessionHandle {
            id,
            state,
            kill_tx: None,
        }
    }

    /// Kills one session by id. Returns whether it was active.
    #[instrument(skip(self))]
    pub fn stop(&self, id: &str) -> bool {
        let removed = self.inner.active.lock().remove(id);
        match removed {
            Some(session) => {
                info!(target: PLAYER_LOG_TARGET, "Stopping playback session.");
                session.kill();
                true
            }
            None => {
                debug!(target: PLAYER_LOG_TARGET, "No active session with that id.");
                false
            }
        }
    }

    /// Kills every active session and empties the set. The callbacks fire
    /// later, with a success result, as each killed process is reaped.
    #[instrument(skip(self))]
    pub fn stop_all(&self) {
        let drained = self.inner.active.lock().drain();
        if drained.is_empty() {
            trace!(target: PLAYER_LOG_TARGET, "stop_all with no active sessions.");
            return;
        }
        info!(target: PLAYER_LOG_TARGET, count = drained.len(), "Stopping all playback sessions.");
        for (id, session) in drained {
            if !session.kill() {
                trace!(target: PLAYER_LOG_TARGET, session_id = %id, "Watcher already finished before kill.");
            }
        }
    }

    /// Number of sessions currently running.
    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.inner.active.lock().contains(id)
    }

    /// Correlation ids of the running sessions, in no particular order.
    pub fn active_ids(&self) -> Vec<String> {
        self.inner.active.lock().ids()
    }
}
