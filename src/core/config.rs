//! Catalog configuration.
//!
//! A [`CatalogConfig`] is an explicit value handed to [`crate::index::Index::connect`].
//! Nothing here is cached process-wide, so tests can run many catalogs side by side.

use crate::core::error::CatalogError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_NAME: &str = "cubeindex.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub const ENV_CONFIG_PATH: &str = "CUBEINDEX_CONFIG";
pub const ENV_DB_PATH: &str = "CUBEINDEX_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CUBEINDEX_BUSY_TIMEOUT_MS";

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// SQLite synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Full,
    Normal,
}

impl SyncMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub journal_mode: JournalMode,
    #[serde(default)]
    pub sync_mode: SyncMode,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_NAME)
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: JournalMode::default(),
            sync_mode: SyncMode::default(),
        }
    }
}

impl CatalogConfig {
    /// Config pointing at a specific database file, everything else default.
    pub fn for_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolves the effective config: defaults, then the file (explicit path
    /// or `CUBEINDEX_CONFIG`), then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CatalogError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Same as [`CatalogConfig::load`] with an injectable environment lookup.
    pub fn load_with<F>(explicit: Option<&Path>, env: F) -> Result<Self, CatalogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(ENV_CONFIG_PATH).map(PathBuf::from));
        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(env)?;
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, env: F) -> Result<(), CatalogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(raw) = env(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = raw.trim().parse().map_err(|_| {
                CatalogError::ConfigError(format!(
                    "{} must be an integer number of milliseconds, got '{}'",
                    ENV_BUSY_TIMEOUT_MS, raw
                ))
            })?;
        }
        Ok(())
    }
}
