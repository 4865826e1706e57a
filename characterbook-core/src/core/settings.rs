//! Store settings persistence.
//!
//! Stores the database and import-cache locations plus the search scope in a
//! JSON file at an OS-appropriate location.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Result, SearchSettings};

/// Default database file name inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "characterbook.db3";

/// Persisted store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Directory holding the database file.
    pub data_directory: PathBuf,
    /// Directory under which the import pipeline stages external files.
    pub cache_directory: PathBuf,
    pub database_filename: String,
    pub search: SearchSettings,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            cache_directory: default_cache_directory(),
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            search: SearchSettings::default(),
        }
    }
}

impl StoreSettings {
    /// Settings rooted at `dir`: data in `dir`, cache in `dir/cache`.
    pub fn rooted_at<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            data_directory: dir.to_path_buf(),
            cache_directory: dir.join("cache"),
            ..Self::default()
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_directory.join(&self.database_filename)
    }

    /// Directory the import pipeline stages files into.
    pub fn import_cache_dir(&self) -> PathBuf {
        self.cache_directory.join("imports")
    }

    /// Creates the data and import-cache directories if missing.
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_directory)?;
        fs::create_dir_all(self.import_cache_dir())?;
        Ok(())
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/characterbook/settings.json`
/// - Windows: `%APPDATA%/CharacterBook/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("CharacterBook").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("characterbook").join("settings.json")
    }
}

/// `<platform data dir>/CharacterBook`, falling back to the working directory.
pub fn default_data_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("CharacterBook")
}

/// `<platform cache dir>/CharacterBook`, falling back to the system temp dir.
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("CharacterBook")
}

/// Loads settings from the default location; see [`load_settings_from`].
pub fn load_settings() -> StoreSettings {
    load_settings_from(settings_file_path())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from<P: AsRef<Path>>(path: P) -> StoreSettings {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring corrupt settings file {}: {e}", path.display());
            StoreSettings::default()
        }),
        Err(_) => StoreSettings::default(),
    }
}

/// Saves settings to the default location, creating parent directories as needed.
pub fn save_settings(settings: &StoreSettings) -> Result<()> {
    save_settings_to(settings_file_path(), settings)
}

pub fn save_settings_to<P: AsRef<Path>>(path: P, settings: &StoreSettings) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
