use play_soundfile::config::Settings;
use play_soundfile::logging::init_logging;
use play_soundfile::node::{FlowMessage, NodeEvent, PlaySoundfileNode};
use play_soundfile::player::SessionManager;
use play_soundfile::ui::Cli;
use play_soundfile::init_app_dirs;
use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome counters for one run.
#[derive(Default)]
struct RunSummary {
    played: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::new();
    let args = &cli.args;

    init_app_dirs()?;

    // Load configuration from file or use defaults
    let config_path = match &args.config {
        Some(path) => Path::new(path).to_path_buf(),
        None => Settings::default_path(),
    };
    let mut settings = Settings::load(&config_path)?;
    args.apply_to(&mut settings);
    settings.validate()?;

    init_logging(&settings.log_level, settings.log_format == "json")?;
    info!(config = %config_path.display(), "Settings loaded.");

    // Relative directories mean relative to where we were started
    let directory = Path::new(&settings.directory);
    if directory.is_relative() {
        settings.directory = std::env::current_dir()?.join(directory).to_string_lossy().into_owned();
    }

    let sessions = SessionManager::new(settings.locator());
    let (node, mut events) = PlaySoundfileNode::new(settings.node_config("play-soundfile"), sessions);

    let summary = if args.files.is_empty() {
        run_stdin(&cli, &node, &mut events).await?
    } else {
        run_files(&cli, &node, &mut events, &args.files, settings.allow_multiple).await?
    };

    info!(played = summary.played, failed = summary.failed, "Done.");
    if summary.failed > 0 {
        return Err(format!("{} playback(s) failed", summary.failed).into());
    }
    Ok(())
}

/// Message for a file named on the command line. Absolute paths ignore the
/// configured directory.
fn message_for_file(file: &str) -> FlowMessage {
    let msg = FlowMessage::new(file).with_file(file);
    if PathBuf::from(file).is_absolute() {
        msg.with_directory("/")
    } else {
        msg
    }
}

/// Playbacks still owed a result, counted per msgid since cloned messages
/// share one.
#[derive(Default)]
struct Pending(HashMap<String, usize>);

impl Pending {
    fn add(&mut self, msgid: String) {
        *self.0.entry(msgid).or_default() += 1;
    }

    fn settle(&mut self, msgid: &str) {
        if let Some(count) = self.0.get_mut(msgid) {
            *count -= 1;
            if *count == 0 {
                self.0.remove(msgid);
            }
        }
    }

    fn len(&self) -> usize {
        self.0.values().sum()
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Handles one node event. Returns the msgid it settles, if any.
fn handle_event(cli: &Cli, event: NodeEvent, summary: &mut RunSummary) -> Option<String> {
    match event {
        NodeEvent::Output(msg) => {
            summary.played += 1;
            if let Err(e) = cli.display_output(&msg) {
                warn!("Failed to write output message: {}", e);
            }
            Some(msg.msgid)
        }
        NodeEvent::Error { message, msg } => {
            summary.failed += 1;
            cli.display_error(&message);
            Some(msg.msgid)
        }
        NodeEvent::Status(status) => {
            debug!(?status, "Node status changed.");
            None
        }
    }
}

/// Processes node events until every id in `pending` has settled. Ctrl+C
/// closes the node; the killed playbacks then settle on their own.
async fn wait_for_pending(
    cli: &Cli,
    node: &PlaySoundfileNode,
    events: &mut mpsc::UnboundedReceiver<NodeEvent>,
    pending: &mut Pending,
    summary: &mut RunSummary,
) -> Result<bool, Box<dyn Error>> {
    let mut interrupted = false;
    while !pending.is_empty() {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(msgid) = handle_event(cli, event, summary) {
                    pending.settle(&msgid);
                }
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal?;
                info!("Interrupted, stopping playback.");
                interrupted = true;
                node.close();
            }
        }
    }
    Ok(interrupted)
}

async fn run_files(
    cli: &Cli,
    node: &PlaySoundfileNode,
    events: &mut mpsc::UnboundedReceiver<NodeEvent>,
    files: &[String],
    allow_multiple: bool,
) -> Result<RunSummary, Box<dyn Error>> {
    let mut summary = RunSummary::default();
    let mut pending = Pending::default();

    for file in files {
        let msg = message_for_file(file);
        // Every file yields one result, including a missing-file error
        pending.add(msg.msgid.clone());
        cli.display_playing(file);
        node.receive(msg);

        if !allow_multiple && wait_for_pending(cli, node, events, &mut pending, &mut summary).await? {
            return Ok(summary);
        }
    }

    wait_for_pending(cli, node, events, &mut pending, &mut summary).await?;
    Ok(summary)
}

/// Acts as the node inside a flow: JSON messages in on stdin, forwarded
/// messages out on stdout.
async fn run_stdin(
    cli: &Cli,
    node: &PlaySoundfileNode,
    events: &mut mpsc::UnboundedReceiver<NodeEvent>,
) -> Result<RunSummary, Box<dyn Error>> {
    let mut summary = RunSummary::default();
    let mut pending = Pending::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let msg: FlowMessage = match serde_json::from_str(&line) {
                    Ok(msg) => msg,
                    Err(e) => {
                        cli.display_error(&format!("Invalid message: {}", e));
                        continue;
                    }
                };
                let msgid = msg.msgid.clone();
                if node.receive(msg).is_some() {
                    pending.add(msgid);
                }
            }
            Some(event) = events.recv() => {
                if let Some(msgid) = handle_event(cli, event, &mut summary) {
                    pending.settle(&msgid);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupted, stopping playback.");
                node.close();
                break;
            }
        }
    }

    debug!(pending = pending.len(), "Input finished, waiting for active playbacks.");
    wait_for_pending(cli, node, events, &mut pending, &mut summary).await?;
    Ok(summary)
}
