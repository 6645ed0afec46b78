//! Command-line interface implementation

use clap::Parser;
use std::io::{self, Write};

use crate::audio::PlaybackOptions;
use crate::config::{PlayerOverride, Settings};
use crate::node::FlowMessage;

/// Command-line arguments for play-soundfile
#[derive(Parser, Debug)]
#[command(author, version, about = "Play sound files through the platform's audio player", long_about = None)]
pub struct Args {
    /// Sound files to play. Without files, newline-delimited JSON messages are read from stdin.
    pub files: Vec<String>,

    /// Directory relative file names are resolved against
    #[arg(short, long, env = "PLAY_SOUNDFILE_DIRECTORY")]
    pub directory: Option<String>,

    /// Playback volume (0.0 - 1.0), honoured by afplay only
    #[arg(short, long, env = "PLAY_SOUNDFILE_VOLUME")]
    pub volume: Option<f64>,

    /// Play several files at once instead of one after the other
    #[arg(short = 'm', long)]
    pub allow_multiple: bool,

    /// Config file path
    #[arg(short, long, env = "PLAY_SOUNDFILE_CONFIG")]
    pub config: Option<String>,

    /// Player executable to use instead of probing the host
    #[arg(long, env = "PLAY_SOUNDFILE_PLAYER")]
    pub player: Option<String>,

    /// Argument for --player, repeatable; `{file}` marks the file path
    #[arg(long = "player-arg", allow_hyphen_values = true, requires = "player")]
    pub player_args: Vec<String>,

    /// Log filter, e.g. "debug" or "play_soundfile::player=trace"
    #[arg(short, long, env = "PLAY_SOUNDFILE_LOG")]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_log: bool,
}

impl Args {
    /// Applies command-line values on top of file settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(directory) = &self.directory {
            settings.directory = directory.clone();
        }
        if let Some(volume) = self.volume {
            settings.options = PlaybackOptions {
                volume: Some(volume),
                ..settings.options.clone()
            };
        }
        if self.allow_multiple {
            settings.allow_multiple = true;
        }
        if let Some(executable) = &self.player {
            let args = if self.player_args.is_empty() {
                vec!["{file}".to_string()]
            } else {
                self.player_args.clone()
            };
            settings.player = Some(PlayerOverride {
                executable: executable.clone(),
                args,
            });
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        if self.json_log {
            settings.log_format = "json".to_string();
        }
    }
}

/// CLI user interface for interacting with the application
pub struct Cli {
    pub args: Args,
}

impl Cli {
    /// Create a new CLI instance
    pub fn new() -> Self {
        Cli { args: Args::parse() }
    }

    /// Announce a file about to play
    pub fn display_playing(&self, file: &str) {
        eprintln!("Playing {}", file);
    }

    /// Write a forwarded message as one JSON line on stdout
    pub fn display_output(&self, msg: &FlowMessage) -> io::Result<()> {
        let line = serde_json::to_string(msg)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()
    }

    /// Display error messages
    pub fn display_error(&self, error: &str) {
        eprintln!("Error: {}", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
