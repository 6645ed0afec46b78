//! Flow node that plays a sound file for every inbound message and passes
//! the message on once playback has finished.

mod message;

pub use message::{FlowMessage, NodeEvent, NodeStatus, STOP_TOPIC};

use crate::audio::PlaybackOptions;
use crate::player::{SessionHandle, SessionManager};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

const NODE_LOG_TARGET: &str = "play_soundfile::node";

/// Static configuration of a node, as stored in the flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeConfig {
    pub name: String,
    pub directory: String,
    pub file: String,
    pub options: PlaybackOptions,
    /// When false, messages arriving while something plays are dropped.
    pub allow_multiple: bool,
}

impl NodeConfig {
    /// Parses the options JSON text the flow editor stores. Blank means none.
    pub fn parse_options(text: &str) -> Result<PlaybackOptions, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(PlaybackOptions::default());
        }
        serde_json::from_str(text)
    }
}

/// Joins `directory` and `file` under the root and normalizes the result
/// lexically (`.` dropped, `..` folded, never above `/`).
pub fn soundfile_path(directory: &str, file: &str) -> PathBuf {
    let joined = format!("/{}/{}", directory, file);
    let mut normalized = PathBuf::new();
    for component in Path::new(&joined).components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

pub struct PlaySoundfileNode {
    config: NodeConfig,
    sessions: SessionManager,
    events_tx: mpsc::UnboundedSender<NodeEvent>,
    /// Messages cloned onto several wires share a `_msgid`, so sessions get
    /// their own ids.
    next_session: AtomicU64,
}

fn emit(events_tx: &mpsc::UnboundedSender<NodeEvent>, event: NodeEvent) {
    if let Err(e) = events_tx.send(event) {
        trace!(target: NODE_LOG_TARGET, "No listener for node event: {:?}", e.0);
    }
}

impl PlaySoundfileNode {
    /// Creates the node and the receiver for its outputs, errors and status.
    pub fn new(config: NodeConfig, sessions: SessionManager) -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let node = PlaySoundfileNode {
            config,
            sessions,
            events_tx,
            next_session: AtomicU64::new(1),
        };
        (node, events_rx)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn set_status(&self, status: NodeStatus) {
        emit(&self.events_tx, NodeEvent::Status(status));
    }

    /// Handles one inbound message. Returns the playback handle when a
    /// session was started.
    #[instrument(skip(self, msg), fields(node = %self.config.name, msgid = %msg.msgid))]
    pub fn receive(&self, msg: FlowMessage) -> Option<SessionHandle> {
        if msg.is_stop_request() {
            info!(target: NODE_LOG_TARGET, "Stop requested, killing active playbacks.");
            self.sessions.stop_all();
            self.set_status(NodeStatus::cleared());
            return None;
        }

        if !self.config.allow_multiple && self.sessions.active_count() > 0 {
            debug!(target: NODE_LOG_TARGET, "Playback already active and multiple playbacks are disabled. Dropping message.");
            return None;
        }

        let directory = msg.directory.as_deref().unwrap_or(&self.config.directory);
        let file = msg.file.as_deref().unwrap_or(&self.config.file);
        let path = soundfile_path(directory, file);

        if !path.exists() {
            warn!(target: NODE_LOG_TARGET, path = %path.display(), "Sound file not found.");
            emit(
                &self.events_tx,
                NodeEvent::Error {
                    message: format!("File not found: {}", path.display()),
                    msg,
                },
            );
            return None;
        }

        self.set_status(NodeStatus::playing());

        let events_tx = self.events_tx.clone();
        let sessions = self.sessions.clone();
        let shown_path = path.display().to_string();
        let session_id = format!("{}#{}", msg.msgid, self.next_session.fetch_add(1, Ordering::Relaxed));
        debug!(target: NODE_LOG_TARGET, %session_id, path = %path.display(), "Starting playback.");
        let handle = self.sessions.start(&session_id, &path, &self.config.options, move |outcome| {
            if sessions.active_count() == 0 {
                emit(&events_tx, NodeEvent::Status(NodeStatus::cleared()));
            }
            match outcome.result {
                Ok(()) => emit(&events_tx, NodeEvent::Output(msg)),
                Err(e) => emit(
                    &events_tx,
                    NodeEvent::Error {
                        message: format!("Error playing back file {}: {}", shown_path, e),
                        msg,
                    },
                ),
            }
        });
        Some(handle)
    }

    /// Kills every playback this node started. Used on shutdown.
    pub fn close(&self) {
        info!(target: NODE_LOG_TARGET, node = %self.config.name, "Closing node.");
        self.sessions.stop_all();
        self.set_status(NodeStatus::cleared());
    }
}
