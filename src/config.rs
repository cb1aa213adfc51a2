//! # Configuration Module
//!
//! Data directory discovery and the optional `config.json` that tunes radio
//! generation.
//!
//! ## Data Storage
//!
//! Onde stores its catalog database in the platform-standard data directory:
//! - Linux: `~/.local/share/onde/`
//! - macOS: `~/Library/Application Support/onde/`
//! - Windows: `%APPDATA%\onde\`
//!
//! The configuration file lives in the platform config directory
//! (`~/.config/onde/config.json` on Linux). Every key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "onde";

/// Returns the platform-appropriate data directory for Onde, creating it if
/// needed.
///
/// # Errors
///
/// Returns an error if the system data directory cannot be determined or the
/// `onde` subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let onde_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&onde_dir).with_context(|| {
        format!(
            "Failed to create Onde data directory at {}. Please check file permissions.",
            onde_dir.display()
        )
    })?;

    Ok(onde_dir)
}

/// Returns the platform-appropriate catalog database path.
///
/// # Errors
///
/// See [`get_data_dir`].
///
/// # Examples
///
/// ```no_run
/// use onde::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Database location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("catalog.db"))
}

/// Default location of the configuration file. Not created.
///
/// # Errors
///
/// Returns an error if the system config directory cannot be determined.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system config directory."))?;
    Ok(config_dir.join(APP_DIR).join("config.json"))
}

/// Knobs of the radio pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioTuning {
    /// Tracks requested by `start`.
    pub default_limit: usize,
    /// Tracks requested by each `extend`.
    pub extend_limit: usize,
    /// Share of the limit reserved for the seed artist's own tracks.
    pub artist_tier_ratio: f64,
    /// How many of the artist's newest tracks feed the genre affinity set.
    pub affinity_sample: usize,
    /// Entries kept in rank order when shuffling an artist radio.
    pub artist_head: usize,
    /// Entries kept in rank order when shuffling a genre radio.
    pub genre_head: usize,
    pub prioritize_popular: bool,
    pub prioritize_recent: bool,
    pub shuffle: bool,
}

impl Default for RadioTuning {
    fn default() -> Self {
        Self {
            default_limit: 50,
            extend_limit: 20,
            artist_tier_ratio: 0.6,
            affinity_sample: 10,
            artist_head: 3,
            genre_head: 5,
            prioritize_popular: true,
            prioritize_recent: true,
            shuffle: true,
        }
    }
}

impl RadioTuning {
    /// Reject values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            anyhow::bail!("radio.default_limit must be greater than 0");
        }
        if self.extend_limit == 0 {
            anyhow::bail!("radio.extend_limit must be greater than 0");
        }
        if !(self.artist_tier_ratio > 0.0 && self.artist_tier_ratio <= 1.0) {
            anyhow::bail!(
                "radio.artist_tier_ratio must be in (0, 1], got {}",
                self.artist_tier_ratio
            );
        }
        if self.affinity_sample == 0 {
            anyhow::bail!("radio.affinity_sample must be greater than 0");
        }
        Ok(())
    }

    /// Seed-artist quota for a call asking for `limit` tracks.
    #[must_use]
    pub fn artist_quota(&self, limit: usize) -> usize {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let quota = (limit as f64 * self.artist_tier_ratio).ceil() as usize;
        quota.min(limit)
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the catalog database location.
    pub db_path: Option<PathBuf>,
    pub radio: RadioTuning,
}

impl AppConfig {
    /// Load configuration from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in config file {}", path.display()))?;
        config
            .radio
            .validate()
            .with_context(|| format!("Invalid radio settings in {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    pub radio: RadioTuning,
}

impl RuntimeConfig {
    /// Resolve the runtime configuration from an optional config file path and
    /// an optional database override. The override wins over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is invalid or no database path can
    /// be determined.
    pub fn resolve(config_path: Option<&Path>, db_override: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::load(&get_config_path()?)?,
        };

        let db_path = match db_override.or(config.db_path) {
            Some(path) => path,
            None => get_db_path()?,
        };

        Ok(Self {
            db_path,
            radio: config.radio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_tuning_is_valid() {
        let tuning = RadioTuning::default();
        assert!(tuning.validate().is_ok());
        assert_eq!(tuning.default_limit, 50);
        assert_eq!(tuning.extend_limit, 20);
        assert_eq!((tuning.artist_head, tuning.genre_head), (3, 5));
    }

    #[test]
    fn test_artist_quota_rounds_up() {
        let tuning = RadioTuning::default();
        assert_eq!(tuning.artist_quota(10), 6);
        assert_eq!(tuning.artist_quota(50), 30);
        assert_eq!(tuning.artist_quota(20), 12);
        assert_eq!(tuning.artist_quota(1), 1);
        assert_eq!(tuning.artist_quota(3), 2);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "radio": { "extend_limit": 5, "shuffle": false } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.radio.extend_limit, 5);
        assert!(!config.radio.shuffle);
        assert_eq!(config.radio.default_limit, 50);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "radio": { "artist_tier_ratio": 1.5 } }"#).unwrap();
        assert!(AppConfig::load(&path).is_err());

        fs::write(&path, "not json").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_db_override_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "db_path": "/from/file.db" }"#).unwrap();

        let from_file = RuntimeConfig::resolve(Some(&path), None).unwrap();
        assert_eq!(from_file.db_path, PathBuf::from("/from/file.db"));

        let overridden = RuntimeConfig::resolve(Some(&path), Some(PathBuf::from("/cli.db"))).unwrap();
        assert_eq!(overridden.db_path, PathBuf::from("/cli.db"));
    }

    #[test]
    fn test_data_dir_structure() {
        let path = get_db_path().expect("Should get valid path");
        assert!(path.is_absolute(), "Database path should be absolute");
        assert!(path.to_string_lossy().ends_with("catalog.db"));
        assert_eq!(path.parent().unwrap().file_name().unwrap(), "onde");
    }
}
