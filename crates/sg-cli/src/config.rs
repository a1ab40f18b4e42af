//! Configuration loading and management.
//!
//! Every key can also be set through a `SERAGLIO_`-prefixed environment
//! variable, e.g. `SERAGLIO_DATABASE_PATH` or `SERAGLIO_LOG_FILTER`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the session database file, shared by the tracker and queries.
    pub database_path: PathBuf,
    /// Log filter used when `RUST_LOG` is unset and `--verbose` is off.
    pub log_filter: String,
    /// How long a query waits on the tracker's write lock, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("log_filter", &self.log_filter)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("seraglio.db"),
            log_filter: "info".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `config_path`, then
    /// `SERAGLIO_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("SERAGLIO_"));

        figment.extract()
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Opens the session database, creating its directory if needed.
    pub fn open_database(&self) -> anyhow::Result<sg_db::Database> {
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        sg_db::Database::open_with_busy_timeout(&self.database_path, self.busy_timeout())
            .with_context(|| format!("failed to open database {}", self.database_path.display()))
    }
}

/// Returns the platform-specific config directory for seraglio.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("seraglio"))
}

/// Returns the platform-specific data directory for seraglio.
///
/// On Linux: `~/.local/share/seraglio`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("seraglio"))
}
