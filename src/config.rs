use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};

use crate::ports::spotify::MAX_TRACKS_PER_REQUEST;
use crate::rekordbox::{DEFAULT_DB_KEY, RekordboxDb};
use crate::services::matching::MatchSettings;
use crate::services::sync::{DEFAULT_PLAYLIST_DESCRIPTION, SyncSettings};

/// Settings file, `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to rekordbox's master.db
    database: Option<String>,
    /// SQLCipher key for master.db
    database_key: Option<String>,
    batch_size: Option<usize>,
    concurrency: Option<usize>,
    searches_per_second: Option<u32>,
    playlist_description: Option<String>,
    public: bool,
}

/// Values given on the command line, which win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub dry_run: bool,
}

/// Fully resolved settings for one run, built once and handed to each
/// component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub database: PathBuf,
    pub database_key: String,
    pub match_settings: MatchSettings,
    pub sync_settings: SyncSettings,
    pub dry_run: bool,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("rekordbox-sync").join("config.toml"))
    }

    /// Load the default config file, or defaults if there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn default_contents() -> Self {
        Self {
            database: Some("~/Library/Pioneer/rekordbox/master.db".to_string()),
            batch_size: Some(MAX_TRACKS_PER_REQUEST),
            playlist_description: Some(DEFAULT_PLAYLIST_DESCRIPTION.to_string()),
            ..Self::default()
        }
    }

    /// Write a default config file to `path` unless one already exists.
    /// Returns whether a file was written.
    pub fn create_default_at(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(&Self::default_contents())
            .wrap_err("Failed to serialize default config")?;
        std::fs::write(path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(true)
    }

    /// Expand ~ to home directory
    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.as_deref().map(Self::expand_path)
    }

    /// Merge with command line overrides and validate.
    pub fn resolve(&self, overrides: Overrides) -> Result<RunConfig> {
        let database = overrides
            .database
            .or_else(|| self.database_path())
            .or_else(RekordboxDb::default_path)
            .ok_or_else(|| eyre!("No rekordbox database location configured"))?;

        let batch_size = overrides
            .batch_size
            .or(self.batch_size)
            .unwrap_or(MAX_TRACKS_PER_REQUEST);
        if !(1..=MAX_TRACKS_PER_REQUEST).contains(&batch_size) {
            return Err(eyre!(
                "Batch size must be between 1 and {}, got {}",
                MAX_TRACKS_PER_REQUEST,
                batch_size
            ));
        }

        let concurrency = match self.concurrency {
            Some(limit) => Some(
                NonZeroUsize::new(limit).ok_or_else(|| eyre!("concurrency must be at least 1"))?,
            ),
            None => None,
        };
        let searches_per_second = match self.searches_per_second {
            Some(rate) => Some(
                NonZeroU32::new(rate)
                    .ok_or_else(|| eyre!("searches_per_second must be at least 1"))?,
            ),
            None => None,
        };

        Ok(RunConfig {
            database,
            database_key: self
                .database_key
                .clone()
                .unwrap_or_else(|| DEFAULT_DB_KEY.to_string()),
            match_settings: MatchSettings {
                concurrency,
                searches_per_second,
            },
            sync_settings: SyncSettings {
                batch_size,
                description: self
                    .playlist_description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PLAYLIST_DESCRIPTION.to_string()),
                public: self.public,
            },
            dry_run: overrides.dry_run,
        })
    }
}
