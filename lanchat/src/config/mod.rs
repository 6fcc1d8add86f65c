//! Configuration system for the `LanChat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/lanchat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::user::User;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    user: UserFileConfig,
    chat: ChatFileConfig,
    transfer: TransferFileConfig,
}

/// `[user]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UserFileConfig {
    nick: Option<String>,
    user_id: Option<u32>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    app_name: Option<String>,
    max_history_lines: Option<usize>,
    timestamp_format: Option<String>,
}

/// `[transfer]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TransferFileConfig {
    confirm_poll_interval_ms: Option<u64>,
    download_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- User --
    /// Local nick name.
    pub nick: String,
    /// Local user id.
    pub user_id: u32,

    // -- Chat --
    /// Application name shown in window titles.
    pub app_name: String,
    /// Lines of history kept per conversation.
    pub max_history_lines: usize,
    /// Timestamp format for message lines (chrono).
    pub timestamp_format: String,

    // -- Transfer --
    /// Upper bound on how long a decided offer goes unnoticed.
    pub confirm_poll_interval: Duration,
    /// Where accepted files are written.
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            user_id: std::process::id(),
            app_name: "LanChat".to_string(),
            max_history_lines: 500,
            timestamp_format: "%H:%M:%S".to_string(),
            confirm_poll_interval: Duration::from_millis(50),
            download_dir: dirs::download_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("lanchat"),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. If no `--config` is given, the default path
    /// (`~/.config/lanchat/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            nick: cli
                .nick
                .clone()
                .or_else(|| file.user.nick.clone())
                .unwrap_or(defaults.nick),
            user_id: cli
                .user_id
                .or(file.user.user_id)
                .unwrap_or(defaults.user_id),
            app_name: file
                .chat
                .app_name
                .clone()
                .unwrap_or(defaults.app_name),
            max_history_lines: file
                .chat
                .max_history_lines
                .unwrap_or(defaults.max_history_lines),
            timestamp_format: file
                .chat
                .timestamp_format
                .clone()
                .unwrap_or(defaults.timestamp_format),
            confirm_poll_interval: file
                .transfer
                .confirm_poll_interval_ms
                .map_or(defaults.confirm_poll_interval, Duration::from_millis),
            download_dir: cli
                .download_dir
                .clone()
                .or_else(|| file.transfer.download_dir.clone())
                .unwrap_or(defaults.download_dir),
        }
    }
}

/// Settings handle shared with the front-end.
///
/// Holds the local user and the configuration it was created from.
#[derive(Debug, Clone)]
pub struct Settings {
    me: Arc<User>,
    config: ClientConfig,
}

impl Settings {
    /// Create settings for a local user built from `config`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let me = Arc::new(User::new(config.nick.clone(), config.user_id));
        Self { me, config }
    }

    /// Create settings around an existing local user.
    #[must_use]
    pub const fn with_me(me: Arc<User>, config: ClientConfig) -> Self {
        Self { me, config }
    }

    /// The local user.
    #[must_use]
    pub const fn me(&self) -> &Arc<User> {
        &self.me
    }

    /// The resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "LAN chat client (headless console)")]
pub struct CliArgs {
    /// Your nick name.
    #[arg(long, env = "LANCHAT_NICK")]
    pub nick: Option<String>,

    /// Your numeric user id.
    #[arg(long, env = "LANCHAT_USER_ID")]
    pub user_id: Option<u32>,

    /// Where received files are stored.
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Path to config file (default: `~/.config/lanchat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "LANCHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/lanchat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Nick derived from the login name, cut to the allowed length.
fn default_nick() -> String {
    let nick: String = std::env::var("USER")
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(crate::facade::MAX_NICK_LENGTH)
        .collect();
    if nick.is_empty() {
        "LanUser".to_string()
    } else {
        nick
    }
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("lanchat").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
