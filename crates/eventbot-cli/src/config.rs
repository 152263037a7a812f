//! Bot configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/eventbot/config.toml` by default. Every section is optional:
//!
//! ```toml
//! [store]
//! path = "/var/lib/eventbot/events.json"
//!
//! [scheduler]
//! default_event_minutes = 60
//!
//! [commands]
//! prefix = "!event"
//!
//! [notifications]
//! desktop = true
//!
//! [console]
//! user_id = "alice"
//! channel_id = "general"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use eventbot_server::{DEFAULT_PREFIX, DesktopConfig, ServerConfig, default_data_path};

use crate::error::{CliError, CliResult};

/// Configuration for the eventbot binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Debug mode.
    pub debug: bool,

    pub store: StoreSettings,

    pub scheduler: SchedulerSettings,

    pub commands: CommandSettings,

    pub notifications: NotificationSettings,

    pub console: ConsoleSettings,
}

/// Where events are persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Snapshot path; defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

/// Timer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Length of events scheduled without `--duration`. Unset means events
    /// end as soon as they start.
    pub default_event_minutes: Option<u64>,
}

/// Chat command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Token that starts a command.
    pub prefix: String,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Also show desktop notifications.
    pub desktop: bool,

    /// Application name shown by the notification daemon.
    pub app_name: String,

    /// Popup timeout in seconds.
    pub timeout_secs: u64,

    /// Custom icon path.
    pub icon_path: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            desktop: false,
            app_name: "eventbot".to_string(),
            timeout_secs: 10,
            icon_path: None,
        }
    }
}

/// Identity used for console input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub user_id: String,
    pub channel_id: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            user_id: "console".to_string(),
            channel_id: "console".to_string(),
        }
    }
}

impl BotConfig {
    /// Loads configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> CliResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            CliError::config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventbot")
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> CliResult<()> {
        let prefix = &self.commands.prefix;
        if prefix.is_empty() || prefix.contains(char::is_whitespace) {
            return Err(CliError::config(format!(
                "commands.prefix must be a single non-empty word, got {prefix:?}"
            )));
        }
        if self.scheduler.default_event_minutes == Some(0) {
            return Err(CliError::config(
                "scheduler.default_event_minutes must be greater than zero",
            ));
        }
        if self.console.user_id.is_empty() || self.console.channel_id.is_empty() {
            return Err(CliError::config(
                "console.user_id and console.channel_id must not be empty",
            ));
        }
        Ok(())
    }

    /// Snapshot path to use: explicit override, then `[store] path`, then the
    /// platform default.
    pub fn data_file(&self, data_file_override: Option<&Path>) -> PathBuf {
        data_file_override
            .map(Path::to_path_buf)
            .or_else(|| self.store.path.clone())
            .unwrap_or_else(default_data_path)
    }

    /// Builds the engine configuration.
    pub fn server_config(&self, data_file: Option<PathBuf>) -> ServerConfig {
        let base = match data_file {
            Some(path) => ServerConfig::new(path),
            None => ServerConfig::in_memory(),
        };
        base.with_command_prefix(&self.commands.prefix)
            .with_default_event_length(
                self.scheduler
                    .default_event_minutes
                    .map(|m| Duration::from_secs(m * 60)),
            )
    }

    /// Builds the desktop notifier configuration.
    pub fn desktop_config(&self) -> DesktopConfig {
        let n = &self.notifications;
        let config = DesktopConfig::default()
            .with_app_name(&n.app_name)
            .with_timeout(Duration::from_secs(n.timeout_secs));
        match n.icon_path {
            Some(ref icon) => config.with_icon_path(icon),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: BotConfig = toml::from_str("").unwrap();
        assert_eq!(config.commands.prefix, "!event");
        assert_eq!(config.console.user_id, "console");
        assert!(config.store.path.is_none());
        assert!(config.scheduler.default_event_minutes.is_none());
        assert!(!config.notifications.desktop);
        config.validate().unwrap();
    }

    #[test]
    fn full_file() {
        let config: BotConfig = toml::from_str(
            r#"
debug = true

[store]
path = "/tmp/events.json"

[scheduler]
default_event_minutes = 90

[commands]
prefix = "!ev"

[notifications]
desktop = true
timeout_secs = 3

[console]
user_id = "alice"
channel_id = "games"
"#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/events.json")));
        assert!(config.notifications.desktop);
        assert_eq!(config.notifications.app_name, "eventbot");
        assert_eq!(config.console.channel_id, "games");

        let server = config.server_config(Some(config.data_file(None)));
        assert_eq!(server.data_file, Some(PathBuf::from("/tmp/events.json")));
        assert_eq!(server.command_prefix, "!ev");
        assert_eq!(server.default_event_length, Some(Duration::from_secs(90 * 60)));

        let desktop = config.desktop_config();
        assert_eq!(desktop.timeout, Duration::from_secs(3));
    }

    #[test]
    fn data_file_precedence() {
        let mut config = BotConfig::default();
        assert!(config.data_file(None).ends_with("events.json"));

        config.store.path = Some(PathBuf::from("/a.json"));
        assert_eq!(config.data_file(None), PathBuf::from("/a.json"));
        assert_eq!(
            config.data_file(Some(Path::new("/b.json"))),
            PathBuf::from("/b.json")
        );
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = BotConfig::default();
        config.commands.prefix = "two words".to_string();
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.scheduler.default_event_minutes = Some(0);
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.console.channel_id.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[console]\nuser_id = \"bob\"\n").unwrap();

        let config = BotConfig::load_from(&path).unwrap();
        assert_eq!(config.console.user_id, "bob");
        assert_eq!(config.console.channel_id, "console");
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[commands\n").unwrap();

        let err = BotConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(BotConfig::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn dump_round_trips() {
        let config = BotConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: BotConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.commands.prefix, config.commands.prefix);
    }
}
