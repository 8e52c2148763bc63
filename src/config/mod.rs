//! Configuration Management
//!
//! This module resolves the connection descriptor and the schema
//! configuration the planner builds SQL against.
//!
//! # Configuration Locations
//! - System: `/etc/radctl/config.json`
//! - Per-user: `~/.config/radctl/config.json`
//!
//! # Resolution Precedence
//! 1. Explicit `--config PATH` (must exist and parse)
//! 2. `RADCTL_CONFIG` environment variable (same rules as an explicit path)
//! 3. First readable default location (unreadable candidates are skipped)
//! 4. Built-in defaults
//!
//! Within the chosen sources, fields merge individually: an environment
//! value beats the file value, the file value beats the built-in default.
//! Table names are file-only; connection and default-group fields can also
//! come from `RADCTL_*` environment variables. Blank or unparsable
//! environment values count as absent.
//!
//! # File format
//! ```json
//! {
//!   "postgres": {
//!     "dsn": "host=127.0.0.1 user=radius dbname=radius",
//!     "connect_timeout_seconds": 2,
//!     "statement_timeout_seconds": 5
//!   },
//!   "radius": {
//!     "radcheck_table": "radcheck",
//!     "radusergroup_table": "radusergroup",
//!     "blocklist_table": "vpn_user_blocklist",
//!     "groups_table": "vpn_groups",
//!     "default_group_name": "default",
//!     "default_group_priority": 0
//!   }
//! }
//! ```
//! All fields are optional; absent fields fall through to the next layer.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RadctlError, Result};
use crate::exec::ConnectionConfig;
use crate::plan::SchemaConfig;

/// Environment variable naming an alternate config file
pub const ENV_CONFIG: &str = "RADCTL_CONFIG";
/// Environment override for the connection DSN
pub const ENV_PG_DSN: &str = "RADCTL_PG_DSN";
/// Environment override for the connect timeout (seconds)
pub const ENV_PG_CONNECT_TIMEOUT: &str = "RADCTL_PG_CONNECT_TIMEOUT_SECONDS";
/// Environment override for the statement timeout (seconds)
pub const ENV_PG_STATEMENT_TIMEOUT: &str = "RADCTL_PG_STATEMENT_TIMEOUT_SECONDS";
/// Environment override for the fallback group name
pub const ENV_DEFAULT_GROUP_NAME: &str = "RADCTL_DEFAULT_GROUP_NAME";
/// Environment override for the fallback group priority
pub const ENV_DEFAULT_GROUP_PRIORITY: &str = "RADCTL_DEFAULT_GROUP_PRIORITY";

/// Fully resolved configuration: connection descriptor + schema settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Connection descriptor handed to the executor
    pub connection: ConnectionConfig,
    /// Table names and default group handed to the planner, validated
    pub schema: SchemaConfig,
}

/// One partial configuration source (environment, file)
///
/// Every field is optional; [`merge_layers`] folds an ordered list of
/// layers into a [`Config`], first non-empty value winning per field. The
/// merge is a pure function so precedence is testable without touching the
/// filesystem or the process environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    pub dsn: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
    pub statement_timeout_seconds: Option<u64>,
    pub radcheck_table: Option<String>,
    pub radusergroup_table: Option<String>,
    pub blocklist_table: Option<String>,
    pub groups_table: Option<String>,
    pub default_group_name: Option<String>,
    pub default_group_priority: Option<i64>,
}

/// `postgres` section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PostgresSection {
    dsn: Option<String>,
    connect_timeout_seconds: Option<u64>,
    statement_timeout_seconds: Option<u64>,
}

/// `radius` section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RadiusSection {
    radcheck_table: Option<String>,
    radusergroup_table: Option<String>,
    blocklist_table: Option<String>,
    groups_table: Option<String>,
    default_group_name: Option<String>,
    default_group_priority: Option<i64>,
}

/// On-disk config file shape
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    postgres: PostgresSection,
    radius: RadiusSection,
}

impl FileConfig {
    fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            dsn: self.postgres.dsn,
            connect_timeout_seconds: self.postgres.connect_timeout_seconds,
            statement_timeout_seconds: self.postgres.statement_timeout_seconds,
            radcheck_table: self.radius.radcheck_table,
            radusergroup_table: self.radius.radusergroup_table,
            blocklist_table: self.radius.blocklist_table,
            groups_table: self.radius.groups_table,
            default_group_name: self.radius.default_group_name,
            default_group_priority: self.radius.default_group_priority,
        }
    }
}

/// Default config file locations, probed in order
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/radctl/config.json")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("radctl").join("config.json"));
    }
    paths
}

/// Merge ordered layers into a resolved config, built-in defaults last
///
/// For each field the first layer carrying a value wins; fields no layer
/// carries fall back to [`ConnectionConfig::default`] and
/// [`SchemaConfig::default`]. The result is not yet validated.
#[must_use]
pub fn merge_layers(layers: &[ConfigLayer]) -> Config {
    fn first<T: Clone>(
        layers: &[ConfigLayer],
        field: impl Fn(&ConfigLayer) -> &Option<T>,
    ) -> Option<T> {
        layers.iter().find_map(|layer| field(layer).clone())
    }

    let connection_defaults = ConnectionConfig::default();
    let schema_defaults = SchemaConfig::default();

    Config {
        connection: ConnectionConfig {
            dsn: first(layers, |l| &l.dsn),
            connect_timeout_seconds: first(layers, |l| &l.connect_timeout_seconds)
                .unwrap_or(connection_defaults.connect_timeout_seconds),
            statement_timeout_seconds: first(layers, |l| &l.statement_timeout_seconds)
                .unwrap_or(connection_defaults.statement_timeout_seconds),
        },
        schema: SchemaConfig {
            radcheck_table: first(layers, |l| &l.radcheck_table)
                .unwrap_or(schema_defaults.radcheck_table),
            radusergroup_table: first(layers, |l| &l.radusergroup_table)
                .unwrap_or(schema_defaults.radusergroup_table),
            blocklist_table: first(layers, |l| &l.blocklist_table)
                .unwrap_or(schema_defaults.blocklist_table),
            groups_table: first(layers, |l| &l.groups_table)
                .unwrap_or(schema_defaults.groups_table),
            default_group_name: first(layers, |l| &l.default_group_name)
                .unwrap_or(schema_defaults.default_group_name),
            default_group_priority: first(layers, |l| &l.default_group_priority)
                .unwrap_or(schema_defaults.default_group_priority),
        },
    }
}

/// Load and validate configuration
///
/// `explicit_path` is the `--config` argument; when absent, `RADCTL_CONFIG`
/// is consulted, then the default locations. An explicit path that does not
/// exist is [`RadctlError::ConfigNotFound`]; a chosen file that cannot be
/// read or parsed is [`RadctlError::ConfigUnreadable`].
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let explicit = explicit_path
        .map(Path::to_path_buf)
        .or_else(|| env_str(ENV_CONFIG).map(PathBuf::from));

    let file_layer = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(RadctlError::config_not_found(path.display().to_string()));
            }
            let contents = fs::read_to_string(&path).map_err(|e| {
                RadctlError::config_unreadable(format!("{}: {e}", path.display()))
            })?;
            parse_file_layer(&contents, &path)?
        }
        None => {
            let mut layer = ConfigLayer::default();
            for candidate in default_config_paths() {
                if !candidate.exists() {
                    continue;
                }
                let Ok(contents) = fs::read_to_string(&candidate) else {
                    continue;
                };
                layer = parse_file_layer(&contents, &candidate)?;
                break;
            }
            layer
        }
    };

    let config = merge_layers(&[env_layer(), file_layer]);
    config.schema.validate()?;
    Ok(config)
}

/// Parse one config file's contents into a layer
fn parse_file_layer(contents: &str, path: &Path) -> Result<ConfigLayer> {
    let file: FileConfig = serde_json::from_str(contents).map_err(|e| {
        RadctlError::config_unreadable(format!("{}: invalid config file: {e}", path.display()))
    })?;
    Ok(file.into_layer())
}

/// Layer built from `RADCTL_*` environment variables
///
/// Table names have no environment override; they come from the file layer
/// or the built-in defaults only.
fn env_layer() -> ConfigLayer {
    ConfigLayer {
        dsn: env_str(ENV_PG_DSN),
        connect_timeout_seconds: env_parse(ENV_PG_CONNECT_TIMEOUT),
        statement_timeout_seconds: env_parse(ENV_PG_STATEMENT_TIMEOUT),
        default_group_name: env_str(ENV_DEFAULT_GROUP_NAME),
        default_group_priority: env_parse(ENV_DEFAULT_GROUP_PRIORITY),
        ..ConfigLayer::default()
    }
}

/// Trimmed environment string; blank counts as absent
fn env_str(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parsed environment value; blank or unparsable counts as absent
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_str(name).and_then(|value| value.parse().ok())
}
