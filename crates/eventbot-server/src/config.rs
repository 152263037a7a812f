//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "!event";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the JSON snapshot; `None` keeps events in memory only.
    pub data_file: Option<PathBuf>,

    /// Token a chat line must start with to be treated as a command.
    pub command_prefix: String,

    /// Length given to events scheduled without `--duration`.
    ///
    /// `None` means events have no end time and end right after they start.
    pub default_event_length: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_file: Some(default_data_path()),
            command_prefix: DEFAULT_PREFIX.to_string(),
            default_event_length: None,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration persisting to `data_file`.
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: Some(data_file.into()),
            ..Default::default()
        }
    }

    /// Creates a configuration that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            data_file: None,
            ..Default::default()
        }
    }

    /// Builder: set command prefix.
    pub fn with_command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.command_prefix = prefix.into();
        self
    }

    /// Builder: set default event length.
    pub fn with_default_event_length(mut self, length: Option<Duration>) -> Self {
        self.default_event_length = length;
        self
    }
}

/// Returns the default snapshot path.
///
/// Uses `$XDG_DATA_HOME/eventbot/events.json` (or the platform equivalent),
/// falling back to `./eventbot-events.json`.
pub fn default_data_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("eventbot").join("events.json"))
        .unwrap_or_else(|| PathBuf::from("eventbot-events.json"))
}
