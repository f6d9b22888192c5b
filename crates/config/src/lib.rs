//! Configuration for hondana.
//!
//! Values are layered with [`figment`], lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. An optional configuration file. The format is picked from the file
//!    extension (`.toml`, `.yaml`/`.yml`, `.json`); anything else is read as TOML.
//! 3. Environment variables prefixed with `HONDANA_`, with nested keys
//!    separated by a double underscore (`HONDANA_SYNC__CALL_TIMEOUT_SECS=10`).
//!
//! The loaded [`Config`] is passed explicitly to the constructors that need
//! it; nothing in the workspace reads configuration from global state.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default remote extension repository.
pub const DEFAULT_REPOSITORY_URL: &str = "https://hondana-extensions.github.io/repo/";
const ENV_PREFIX: &str = "HONDANA_";
const DATABASE_FILENAME: &str = "hondana.sqlite";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub extensions: ExtensionsConfig,
    pub sync: SyncConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file (created if missing).
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    /// Base URL of the remote extension repository. The manifest is expected
    /// at `<repository_url>/index.json`.
    pub repository_url: String,
    /// Timeout for manifest and package downloads.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of sources synchronized at the same time.
    pub max_sources_in_flight: usize,
    /// Maximum number of chapter-list calls in flight for a single source.
    /// `1` means favorites of a source are fetched one after the other.
    pub per_source_concurrency: usize,
    /// Every capability call is abandoned (and reported as unreachable) after this long.
    pub call_timeout_secs: u64,
    /// Delay between two periodic sync runs.
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub timeout_secs: u64,
    /// Sent when a source's header policy doesn't override `User-Agent`.
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig { path: default_database_path() },
            extensions: ExtensionsConfig {
                repository_url: DEFAULT_REPOSITORY_URL.to_string(),
                timeout_secs: 30,
            },
            sync: SyncConfig {
                max_sources_in_flight: 4,
                per_source_concurrency: 1,
                call_timeout_secs: 30,
                interval_secs: 3600,
            },
            relay: RelayConfig {
                timeout_secs: 30,
                user_agent: None,
            },
        }
    }
}

impl Config {
    /// Build the layered [`Figment`] without extracting it.
    ///
    /// Useful for callers that want to merge in their own providers (command
    /// line flags, for example) before calling [`Config::from_figment`].
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Toml::file(file)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        if let Some(file) = file
            && !file.exists()
        {
            tracing::warn!(path = %file.display(), "Configuration file does not exist; using defaults");
        }
        Self::from_figment(Self::figment(file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extensions.repository_url.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("extensions.repository_url"));
        }
        if self.extensions.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("extensions.timeout_secs"));
        }
        if self.sync.max_sources_in_flight == 0 {
            exn::bail!(ErrorKind::Invalid("sync.max_sources_in_flight"));
        }
        if self.sync.per_source_concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("sync.per_source_concurrency"));
        }
        if self.sync.call_timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("sync.call_timeout_secs"));
        }
        if self.sync.interval_secs == 0 {
            exn::bail!(ErrorKind::Invalid("sync.interval_secs"));
        }
        if self.relay.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("relay.timeout_secs"));
        }
        Ok(())
    }
}

impl ExtensionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SyncConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Default location of the configuration file, if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "hondana").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_database_path() -> PathBuf {
    match ProjectDirs::from("", "", "hondana") {
        Some(dirs) => dirs.data_dir().join(DATABASE_FILENAME),
        None => {
            tracing::warn!("No home directory found; storing the database in the working directory");
            PathBuf::from(DATABASE_FILENAME)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.sync.per_source_concurrency, 1);
        assert!(config.database.path.ends_with(DATABASE_FILENAME));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap();
        assert_eq!(config.sync, Config::default().sync);
    }

    #[rstest]
    #[case(".toml", "[sync]\ncall_timeout_secs = 5\n")]
    #[case(".yaml", "sync:\n  call_timeout_secs: 5\n")]
    #[case(".json", r#"{"sync": {"call_timeout_secs": 5}}"#)]
    fn test_file_formats(#[case] suffix: &str, #[case] contents: &str) {
        let file = write_config(suffix, contents);
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.sync.call_timeout(), Duration::from_secs(5));
        // Untouched values keep their defaults.
        assert_eq!(config.sync.max_sources_in_flight, 4);
    }

    #[rstest]
    #[case("[sync]\nmax_sources_in_flight = 0\n", "sync.max_sources_in_flight")]
    #[case("[sync]\nper_source_concurrency = 0\n", "sync.per_source_concurrency")]
    #[case("[extensions]\nrepository_url = \"  \"\n", "extensions.repository_url")]
    #[case("[relay]\ntimeout_secs = 0\n", "relay.timeout_secs")]
    fn test_invalid_values(#[case] contents: &str, #[case] field: &'static str) {
        let file = write_config(".toml", contents);
        let err = Config::load(Some(file.path())).unwrap_err();
        assert_eq!(*err, ErrorKind::Invalid(field));
    }

    #[test]
    fn test_wrong_type_is_a_load_error() {
        let file = write_config(".toml", "[sync]\ncall_timeout_secs = \"soon\"\n");
        let err = Config::load(Some(file.path())).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }
}
