//! Configuration for the `kanban` CLI.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/kanban/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};

use crate::ui::board::DEFAULT_LANE_WIDTH;

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

    /// The store URL is not a WebSocket URL.
    #[error("invalid store URL {url}: {reason}")]
    InvalidStoreUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The date format has a specifier `chrono` does not know.
    #[error("invalid date format {0:?}")]
    InvalidDateFormat(String),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    store: StoreFileConfig,
    account: AccountFileConfig,
    ui: UiFileConfig,
}

/// `[store]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
}

/// `[account]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AccountFileConfig {
    email: Option<String>,
    display_name: Option<String>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    layout: Option<Layout>,
    lane_width: Option<usize>,
    date_format: Option<String>,
    notification_buffer: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// How the board is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Lanes side by side.
    #[default]
    Board,
    /// One row per task.
    List,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Store WebSocket URL; offline demo mode when `None`.
    pub store_url: Option<String>,
    /// Timeout for connecting to the store.
    pub connect_timeout: Duration,
    /// Account email used to sign in.
    pub email: String,
    /// Display name sent on sign-in.
    pub display_name: Option<String>,
    /// Board rendering style.
    pub layout: Layout,
    /// Lane width of the board layout.
    pub lane_width: usize,
    /// Due-date display format (chrono format string).
    pub date_format: String,
    /// Capacity of the notification channel.
    pub notification_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            connect_timeout: Duration::from_secs(10),
            email: "demo@example.com".to_string(),
            display_name: None,
            layout: Layout::Board,
            lane_width: DEFAULT_LANE_WIDTH,
            date_format: "%Y-%m-%d".to_string(),
            notification_buffer: 64,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read,
    /// if any config file cannot be parsed, or if the resolved store URL is
    /// not a `ws://` or `wss://` URL.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let store_url = cli.store_url.clone().or_else(|| file.store.url.clone());
        if let Some(url) = &store_url {
            validate_store_url(url)?;
        }
        let date_format = cli
            .date_format
            .clone()
            .or_else(|| file.ui.date_format.clone())
            .unwrap_or(defaults.date_format);
        validate_date_format(&date_format)?;

        Ok(Self {
            store_url,
            connect_timeout: file
                .store
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            email: cli
                .email
                .clone()
                .or_else(|| file.account.email.clone())
                .unwrap_or(defaults.email),
            display_name: cli
                .display_name
                .clone()
                .or_else(|| file.account.display_name.clone()),
            layout: if cli.list {
                Layout::List
            } else {
                file.ui.layout.unwrap_or(defaults.layout)
            },
            lane_width: cli
                .lane_width
                .or(file.ui.lane_width)
                .unwrap_or(defaults.lane_width),
            date_format,
            notification_buffer: file
                .ui
                .notification_buffer
                .unwrap_or(defaults.notification_buffer)
                .max(1),
        })
    }
}

/// Checks that `url` parses and uses the `ws` or `wss` scheme.
fn validate_store_url(url: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(url).map_err(|e| ConfigError::InvalidStoreUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ConfigError::InvalidStoreUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other:?}, expected ws or wss"),
        }),
    }
}

fn validate_date_format(format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidDateFormat(format.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Kanban boards from the terminal")]
pub struct CliArgs {
    /// WebSocket URL of the kanban store (offline demo when absent).
    #[arg(long, env = "KANBAN_STORE_URL", global = true)]
    pub store_url: Option<String>,

    /// Account email.
    #[arg(long, env = "KANBAN_EMAIL", global = true)]
    pub email: Option<String>,

    /// Display name sent on sign-in.
    #[arg(long, global = true)]
    pub display_name: Option<String>,

    /// Print tasks as a list instead of lanes.
    #[arg(long, global = true)]
    pub list: bool,

    /// Lane width of the board layout.
    #[arg(long, global = true)]
    pub lane_width: Option<usize>,

    /// Due-date display format (chrono format string).
    #[arg(long, global = true)]
    pub date_format: Option<String>,

    /// Path to config file (default: `~/.config/kanban/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "KANBAN_LOG", global = true)]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/kanban.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// What to do; `show` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI commands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Render the selected board.
    Show,
    /// List visible boards.
    Boards,
    /// Create a task.
    Add {
        title: String,
        /// Column id or name (first column when omitted).
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Tag, repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Due date as YYYY-MM-DD.
        #[arg(long)]
        due: Option<String>,
    },
    /// Drag a task onto another column.
    Move { task: String, column: String },
    /// Mark a task completed.
    Done { task: String },
    /// Edit a task's title or description.
    Edit {
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a task.
    Rm { task: String },
    /// Search tasks by title, description or tag.
    Search { text: String },
    /// Manage columns.
    #[command(subcommand)]
    Column(ColumnCommand),
    /// Manage subtasks.
    #[command(subcommand)]
    Subtask(SubtaskCommand),
}

/// `kanban column ...`
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ColumnCommand {
    /// Append a column.
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a column with its tasks.
    Rm { column: String },
}

/// `kanban subtask ...`
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SubtaskCommand {
    /// Add a checklist item to a task.
    Add { task: String, title: String },
    /// Flip a subtask's completion.
    Toggle { subtask: String },
    /// Delete a subtask.
    Rm { subtask: String },
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("kanban").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
