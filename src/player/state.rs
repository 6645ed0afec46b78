use crate::audio::PlaybackError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Lifecycle of one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Completed { success: bool },
    Killed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed { .. } | SessionState::Killed)
    }
}

/// Result delivered exactly once to a session's completion callback.
#[derive(Debug)]
pub struct SessionOutcome {
    pub id: String,
    pub result: Result<(), PlaybackError>,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Completion handler registered with `SessionManager::start`.
pub type CompletionCallback = Box<dyn FnOnce(SessionOutcome) + Send + 'static>;

pub(crate) type SharedState = Arc<Mutex<SessionState>>;

/// Terminal report sent from a watcher (or from a failed start) to the
/// completion loop.
pub(crate) struct CompletionEvent {
    pub id: String,
    /// `None` when the session never entered the active set.
    pub serial: Option<u64>,
    pub state: SharedState,
    pub result: Result<(), PlaybackError>,
    pub killed: bool,
    pub callback: CompletionCallback,
}

impl CompletionEvent {
    pub fn terminal_state(&self) -> SessionState {
        if self.killed {
            SessionState::Killed
        } else {
            SessionState::Completed {
                success: self.result.is_ok(),
            }
        }
    }
}

/// Entry of the active set for a running session.
#[derive(Debug)]
pub(crate) struct ActiveSession {
    pub serial: u64,
    pub kill_tx: broadcast::Sender<()>,
}

impl ActiveSession {
    /// Requests termination; harmless when the process is already gone.
    pub fn kill(&self) -> bool {
        self.kill_tx.send(()).is_ok()
    }
}

/// Sessions that have not reached a terminal state, keyed by correlation id.
#[derive(Debug, Default)]
pub(crate) struct ActiveSessionSet {
    sessions: HashMap<String, ActiveSession>,
}

impl ActiveSessionSet {
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn insert(&mut self, id: String, session: ActiveSession) {
        self.sessions.insert(id, session);
    }

    pub fn remove(&mut self, id: &str) -> Option<ActiveSession> {
        self.sessions.remove(id)
    }

    /// Removes `id` only if it still refers to the session numbered `serial`.
    pub fn remove_if_current(&mut self, id: &str, serial: u64) -> bool {
        match self.sessions.get(id) {
            Some(session) if session.serial == serial => {
                self.sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    pub fn drain(&mut self) -> Vec<(String, ActiveSession)> {
        self.sessions.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }
}
