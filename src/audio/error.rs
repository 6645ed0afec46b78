use std::io;
use thiserror::Error;

/// Error types specific to a playback session.
///
/// None of these are raised out of `SessionManager::start`; they only travel
/// through the per-session completion callback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No external player could be located for the host platform.
    #[error("No audio player found. Please install one of: {}", .candidates.join(", "))]
    NoPlayerFound { candidates: Vec<String> },

    /// The player executable could not be started.
    #[error("Failed to launch {executable}: {source}")]
    Launch {
        executable: String,
        #[source]
        source: io::Error,
    },

    /// The player ran and exited with a non-zero status.
    #[error("Player exited with code {code}")]
    RuntimeExit { code: i32 },

    /// OS-level failure while waiting on an already running player.
    #[error("Player process error: {0}")]
    Process(#[source] io::Error),

    /// A session with the same correlation id is still active.
    #[error("Playback session {0} is already active")]
    DuplicateSession(String),
}

impl PlaybackError {
    /// Exit code carried by a `RuntimeExit`, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            PlaybackError::RuntimeExit { code } => Some(*code),
            _ => None,
        }
    }
}
