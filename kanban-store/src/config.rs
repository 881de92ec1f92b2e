//! Store server settings and the board template given to new users.
//!
//! Values come from the command line (or its `KANBAN_STORE_*` variables),
//! then `~/.config/kanban-store/config.toml`, then built-in defaults.

use std::path::{Path, PathBuf};

use kanban_proto::dataset::Provisioning;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("provisioning template must define at least one column")]
    NoColumns,

    /// Column names are shown as lane headers and looked up by name.
    #[error("provisioning column {0} has a blank name")]
    BlankColumnName(usize),
}

/// Shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreConfigFile {
    server: ServerSection,
    provisioning: ProvisioningSection,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerSection {
    bind_addr: Option<String>,
    max_payload_size: Option<usize>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ProvisioningSection {
    board_name: Option<String>,
    columns: Option<Vec<ColumnTemplate>>,
}

/// `[[provisioning.columns]]`, left to right.
#[derive(Debug, serde::Deserialize)]
struct ColumnTemplate {
    name: String,
    #[serde(default = "default_column_color")]
    color: String,
}

fn default_column_color() -> String {
    "#94a3b8".to_string()
}

#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Hosted kanban store")]
pub struct StoreCliArgs {
    /// Listen address, e.g. `127.0.0.1:9400`.
    #[arg(short, long, env = "KANBAN_STORE_ADDR")]
    pub bind: Option<String>,

    /// Config file to use instead of `~/.config/kanban-store/config.toml`.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Largest request frame the store will serve, in bytes.
    #[arg(long)]
    pub max_payload_size: Option<usize>,

    /// Name of the board created on a user's first sign-in.
    #[arg(long)]
    pub default_board_name: Option<String>,

    #[arg(long, default_value = "info", env = "KANBAN_STORE_LOG")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub bind_addr: String,
    pub max_payload_size: usize,
    /// Board and columns created for a user with no boards.
    pub provisioning: Provisioning,
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9400".to_string(),
            max_payload_size: 256 * 1024,
            provisioning: Provisioning::default(),
            log_level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Reads the config file and merges it under the command line.
    ///
    /// A missing default file is fine; a missing `--config` file is not.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unreadable or malformed file, or a
    /// column template that is empty or has a blank name.
    pub fn load(cli: &StoreCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, file)
    }

    fn resolve(cli: &StoreCliArgs, file: StoreConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let columns = match file.provisioning.columns {
            Some(columns) if columns.is_empty() => return Err(ConfigError::NoColumns),
            Some(columns) => column_template(columns)?,
            None => defaults.provisioning.columns,
        };
        let board_name = cli
            .default_board_name
            .clone()
            .or(file.provisioning.board_name)
            .unwrap_or(defaults.provisioning.board_name);

        Ok(Self {
            bind_addr: cli
                .bind
                .clone()
                .or(file.server.bind_addr)
                .unwrap_or(defaults.bind_addr),
            max_payload_size: cli
                .max_payload_size
                .or(file.server.max_payload_size)
                .unwrap_or(defaults.max_payload_size),
            provisioning: Provisioning {
                board_name,
                columns,
            },
            log_level: cli.log_level.clone(),
        })
    }
}

fn column_template(columns: Vec<ColumnTemplate>) -> Result<Vec<(String, String)>, ConfigError> {
    columns
        .into_iter()
        .enumerate()
        .map(|(index, c)| {
            let name = c.name.trim();
            if name.is_empty() {
                return Err(ConfigError::BlankColumnName(index));
            }
            Ok((name.to_string(), c.color))
        })
        .collect()
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<StoreConfigFile, ConfigError> {
    let (path, required) = match explicit_path {
        Some(p) => (p.to_path_buf(), true),
        None => match dirs::config_dir() {
            Some(dir) => (dir.join("kanban-store").join("config.toml"), false),
            None => return Ok(StoreConfigFile::default()),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            Ok(StoreConfigFile::default())
        }
        Err(source) => Err(ConfigError::ReadFile { path, source }),
    }
}
