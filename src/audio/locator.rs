//! Player Locator: decides which external executable renders audio on the
//! host, and how its argument list is built for a file.
//!
//! Nothing in here runs the player or touches the audio file. The only side
//! effect allowed during resolution is looking at the executable search path.

use crate::audio::PlaybackError;
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

pub(crate) const LOCATOR_LOG_TARGET: &str = "play_soundfile::locator";

/// Unix players probed in priority order.
pub const UNIX_CANDIDATES: [&str; 7] = ["aplay", "mpg123", "mpg321", "play", "mplayer", "omxplayer", "cvlc"];

/// Token replaced by the file path in `ArgStyle::Template` arguments.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Host platform family, as far as player selection is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Other,
}

impl Platform {
    /// Platform family of the running binary.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

/// Per-call playback settings.
///
/// Only `volume` is understood today and only by `afplay`; every other key is
/// carried along untouched and ignored by players that cannot honour it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PlaybackOptions {
    pub fn with_volume(volume: f64) -> Self {
        PlaybackOptions {
            volume: Some(volume),
            ..Default::default()
        }
    }
}

/// How a recipe turns (file, options) into an argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgStyle {
    /// `[file]`
    FileOnly,
    /// `["--play-and-exit", file]`, for cvlc.
    PlayAndExit,
    /// `[file]` plus `-v <volume>` when a volume is set, for afplay.
    Afplay,
    /// A PowerShell MediaPlayer script passed through `-Command`.
    PowerShell,
    /// Fixed arguments where every `{file}` token becomes the path.
    Template(Vec<String>),
}

/// Immutable description of how to invoke one external player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecipe {
    pub executable: String,
    pub args: ArgStyle,
    /// Where probing found the executable; launched instead of a `PATH` lookup.
    pub path: Option<PathBuf>,
}

impl PlayerRecipe {
    pub fn new(executable: impl Into<String>, args: ArgStyle) -> Self {
        PlayerRecipe {
            executable: executable.into(),
            args,
            path: None,
        }
    }

    /// Recipe for a Unix candidate found at `path`.
    fn for_unix_candidate(name: &str, path: PathBuf) -> Self {
        let args = if name == "cvlc" { ArgStyle::PlayAndExit } else { ArgStyle::FileOnly };
        PlayerRecipe {
            path: Some(path),
            ..PlayerRecipe::new(name, args)
        }
    }

    /// Program to hand to the OS when launching.
    pub fn program(&self) -> &OsStr {
        match &self.path {
            Some(path) => path.as_os_str(),
            None => OsStr::new(&self.executable),
        }
    }

    /// Builds the ordered argument list for `file`. Pure.
    pub fn build_args(&self, file: &Path, options: &PlaybackOptions) -> Vec<String> {
        let file = file.to_string_lossy().into_owned();
        match &self.args {
            ArgStyle::FileOnly => vec![file],
            ArgStyle::PlayAndExit => vec!["--play-and-exit".to_string(), file],
            ArgStyle::Afplay => {
                let mut args = vec![file];
                if let Some(volume) = options.volume {
                    args.push("-v".to_string());
                    args.push(volume.to_string());
                }
                args
            }
            ArgStyle::PowerShell => vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                powershell_script(&file),
            ],
            ArgStyle::Template(template) => template.iter().map(|arg| arg.replace(FILE_PLACEHOLDER, &file)).collect(),
        }
    }
}

/// Doubles single quotes so the path can sit inside a PowerShell '...' literal.
pub fn escape_powershell_literal(path: &str) -> String {
    path.replace('\'', "''")
}

/// MediaPlayer script that plays `path` to its natural end and releases the player.
pub fn powershell_script(path: &str) -> String {
    format!(
        "Add-Type -AssemblyName presentationCore\n\
         $player = New-Object System.Windows.Media.MediaPlayer\n\
         $player.Open([uri]'{}')\n\
         $player.Play()\n\
         Start-Sleep -Milliseconds 500\n\
         while ($player.Position -lt $player.NaturalDuration.TimeSpan) {{\n\
         \x20 Start-Sleep -Milliseconds 100\n\
         }}\n\
         $player.Stop()\n\
         $player.Close()\n",
        escape_powershell_literal(path)
    )
}

/// Source of player recipes for the session manager.
pub trait PlayerLocator: Send + Sync {
    fn resolve(&self) -> Result<PlayerRecipe, PlaybackError>;
}

/// Locator that inspects the host every time it is asked.
#[derive(Debug, Clone)]
pub struct SystemLocator {
    platform: Platform,
    search_path: Option<OsString>,
}

impl SystemLocator {
    /// Locator for the running host, probing `PATH`.
    pub fn new() -> Self {
        SystemLocator {
            platform: Platform::current(),
            search_path: None,
        }
    }

    pub fn for_platform(platform: Platform) -> Self {
        SystemLocator {
            platform,
            search_path: None,
        }
    }

    /// Probes `search_path` instead of the `PATH` environment variable.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }
}

impl Default for SystemLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerLocator for SystemLocator {
    fn resolve(&self) -> Result<PlayerRecipe, PlaybackError> {
        match &self.search_path {
            Some(path) => resolve_with_search_path(self.platform, path),
            None => resolve(self.platform),
        }
    }
}

/// Locator that always hands out the same recipe (configured override).
#[derive(Debug, Clone)]
pub struct FixedLocator(pub PlayerRecipe);

impl PlayerLocator for FixedLocator {
    fn resolve(&self) -> Result<PlayerRecipe, PlaybackError> {
        Ok(self.0.clone())
    }
}

/// Resolves the player recipe for `platform`, probing the `PATH` variable.
pub fn resolve(platform: Platform) -> Result<PlayerRecipe, PlaybackError> {
    let search_path = env::var_os("PATH").unwrap_or_default();
    resolve_with_search_path(platform, &search_path)
}

/// Resolves the player recipe for `platform` against an explicit search path.
pub fn resolve_with_search_path(platform: Platform, search_path: &OsStr) -> Result<PlayerRecipe, PlaybackError> {
    match platform {
        Platform::MacOs => Ok(PlayerRecipe::new("afplay", ArgStyle::Afplay)),
        Platform::Windows => Ok(PlayerRecipe::new("powershell", ArgStyle::PowerShell)),
        Platform::Other => {
            for candidate in UNIX_CANDIDATES {
                if let Some(found) = find_executable(candidate, search_path) {
                    debug!(target: LOCATOR_LOG_TARGET, player = candidate, path = %found.display(), "Found audio player.");
                    return Ok(PlayerRecipe::for_unix_candidate(candidate, found));
                }
                trace!(target: LOCATOR_LOG_TARGET, player = candidate, "Audio player not on search path.");
            }
            warn!(target: LOCATOR_LOG_TARGET, "No audio player found on search path.");
            Err(PlaybackError::NoPlayerFound {
                candidates: UNIX_CANDIDATES.iter().map(|c| c.to_string()).collect(),
            })
        }
    }
}

/// First directory of `search_path` holding an executable named `name`.
pub fn find_executable(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}
