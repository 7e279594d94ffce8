//! Immutable run configuration loaded once from TOML at startup.
//!
//! Every component receives the pieces it needs from [`MonitorConfig`] by
//! reference; nothing reads configuration from globals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;

pub mod defaults;
mod save;

use defaults::{
    DEFAULT_DATABASE_FILE, DEFAULT_LOCK_FILE, FILENAME_PLACEHOLDER, default_checksum_ttl_days,
    default_extensions, default_false, default_max_log_files, default_table,
    default_validate_command, is_valid_table_name, normalize_extensions,
};
pub use save::save_to_path;

/// Name of the config file inside the application directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Errors that may occur while loading or saving the monitor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to create the config directory.
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        /// Directory path that failed to create.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to write a config file.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        /// TOML file path.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to serialize config to TOML.
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        /// TOML file path.
        path: PathBuf,
        /// TOML serialization error.
        source: toml::ser::Error,
    },
    /// A value parsed but cannot be used.
    #[error("Invalid config value for `{key}`: {reason}")]
    Invalid {
        /// Dotted config key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// Refused to overwrite an existing config file.
    #[error("Config file already exists at {0}")]
    AlreadyExists(PathBuf),
    /// No usable config directory found.
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Complete configuration for one monitoring pass.
///
/// Config sections (TOML): `catalog`, `media`, `validator`, `guard`,
/// `logging`, `notify`, `report`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub media: MediaSettings,
    #[serde(default)]
    pub validator: ValidatorSettings,
    #[serde(default)]
    pub guard: GuardSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub notify: NotifySettings,
    #[serde(default)]
    pub report: ReportSettings,
}

/// Where the catalog lives.
///
/// Config keys: `database_path`, `table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// SQLite database file; defaults to `catalog.db` in the app directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Table holding one row per tracked file.
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            table: default_table(),
        }
    }
}

/// What to scan and how long a checksum stays trusted.
///
/// Config keys: `locations`, `extensions`, `checksum_ttl_days`, `include_hidden`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Root directories scanned recursively.
    #[serde(default)]
    pub locations: Vec<PathBuf>,
    /// Lowercase extensions without dots.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Checksums older than this are recomputed and the file re-validated.
    #[serde(default = "default_checksum_ttl_days")]
    pub checksum_ttl_days: u32,
    /// Descend into dot-directories and pick up dot-files.
    #[serde(default = "default_false")]
    pub include_hidden: bool,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            extensions: default_extensions(),
            checksum_ttl_days: default_checksum_ttl_days(),
            include_hidden: false,
        }
    }
}

impl MediaSettings {
    /// Checksum time-to-live as a duration.
    pub fn checksum_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.checksum_ttl_days) * SECONDS_PER_DAY)
    }
}

/// External validation command.
///
/// Config keys: `command`, `timeout_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSettings {
    /// Shell command containing `{filename}`; must print nothing for a valid file.
    #[serde(default = "default_validate_command")]
    pub command: String,
    /// Kill the validator after this many seconds; unset waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            command: default_validate_command(),
            timeout_secs: None,
        }
    }
}

impl ValidatorSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Config keys: `lock_path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardSettings {
    #[serde(default)]
    pub lock_path: Option<PathBuf>,
}

/// Config keys: `directory`, `max_files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log directory; defaults to `logs/` in the app directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Number of per-run log files kept.
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: None,
            max_files: default_max_log_files(),
        }
    }
}

/// Config keys: `webhook_url`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifySettings {
    /// Receives JSON status, progress and result events when set.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Config keys: `html_path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Write the invalid-file table here at the end of each run.
    #[serde(default)]
    pub html_path: Option<PathBuf>,
}

impl MonitorConfig {
    /// Normalize user input and reject values the monitor cannot run with.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.media.extensions = normalize_extensions(std::mem::take(&mut self.media.extensions));
        if self.media.extensions.is_empty() {
            return Err(ConfigError::Invalid {
                key: "media.extensions",
                reason: "at least one extension is required".into(),
            });
        }
        if self.media.checksum_ttl_days == 0 {
            return Err(ConfigError::Invalid {
                key: "media.checksum_ttl_days",
                reason: "must be at least one day".into(),
            });
        }
        if !self.validator.command.contains(FILENAME_PLACEHOLDER) {
            return Err(ConfigError::Invalid {
                key: "validator.command",
                reason: format!("must contain the {FILENAME_PLACEHOLDER} placeholder"),
            });
        }
        if !is_valid_table_name(&self.catalog.table) {
            return Err(ConfigError::Invalid {
                key: "catalog.table",
                reason: format!("`{}` is not a plain SQL identifier", self.catalog.table),
            });
        }
        if self.validator.timeout_secs == Some(0) {
            self.validator.timeout_secs = None;
        }
        Ok(self)
    }

    /// Catalog database path, falling back to the app directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.catalog.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_root()?.join(DEFAULT_DATABASE_FILE)),
        }
    }

    /// Execution guard token path, falling back to the app directory.
    pub fn lock_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.guard.lock_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_root()?.join(DEFAULT_LOCK_FILE)),
        }
    }
}

/// Resolve the default configuration file path, creating the app directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_root()?.join(CONFIG_FILE_NAME))
}

/// Load and validate configuration from `path`.
pub fn load_from_path(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: MonitorConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    config.validated()
}

/// Load the config at `explicit`, or the default config file when present.
///
/// An explicit path must exist. Without one, a missing default file yields
/// the built-in defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<MonitorConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let path = default_config_path()?;
    if path.is_file() {
        load_from_path(&path)
    } else {
        MonitorConfig::default().validated()
    }
}

fn app_root() -> Result<PathBuf, ConfigError> {
    app_dirs::app_root_dir().map_err(map_app_dir_error)
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let (_dir, path) = write_config("");
        let config = load_from_path(&path).unwrap();
        assert_eq!(config.catalog.table, "media_monitor");
        assert_eq!(config.media.checksum_ttl_days, 180);
        assert!(config.media.extensions.contains(&"mkv".to_string()));
        assert!(config.validator.command.contains("{filename}"));
        assert!(config.validator.timeout().is_none());
        assert_eq!(config.logging.max_files, 10);
    }

    #[test]
    fn extensions_are_normalized() {
        let (_dir, path) = write_config(
            r#"
[media]
locations = ["/media/Movies"]
extensions = [".MKV", "mkv", " Mp4 ", ""]
"#,
        );
        let config = load_from_path(&path).unwrap();
        assert_eq!(config.media.extensions, vec!["mkv", "mp4"]);
        assert_eq!(config.media.locations, vec![PathBuf::from("/media/Movies")]);
    }

    #[test]
    fn command_without_placeholder_is_rejected() {
        let (_dir, path) = write_config("[validator]\ncommand = \"ffmpeg -i file\"\n");
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "validator.command",
                ..
            }
        ));
    }

    #[test]
    fn table_name_must_be_identifier() {
        let (_dir, path) = write_config("[catalog]\ntable = \"media; DROP TABLE x\"\n");
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "catalog.table", .. }));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let (_dir, path) = write_config("[media]\nchecksum_ttl_days = 0\n");
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "media.checksum_ttl_days",
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let (_dir, path) = write_config("[media\n");
        let err = load_from_path(&path).unwrap_err();
        match err {
            ConfigError::ParseToml { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn explicit_paths_win_over_app_dir() {
        let config = MonitorConfig {
            catalog: CatalogSettings {
                database_path: Some(PathBuf::from("/tmp/x.db")),
                ..CatalogSettings::default()
            },
            guard: GuardSettings {
                lock_path: Some(PathBuf::from("/tmp/x.lock")),
            },
            ..MonitorConfig::default()
        };
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/x.db"));
        assert_eq!(config.lock_path().unwrap(), PathBuf::from("/tmp/x.lock"));
    }

    #[test]
    fn ttl_converts_days_to_seconds() {
        let media = MediaSettings {
            checksum_ttl_days: 2,
            ..MediaSettings::default()
        };
        assert_eq!(media.checksum_ttl(), Duration::from_secs(172_800));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            load_or_default(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn zero_timeout_means_no_timeout() {
        let (_dir, path) = write_config("[validator]\ntimeout_secs = 0\n");
        let config = load_from_path(&path).unwrap();
        assert!(config.validator.timeout().is_none());
    }
}
