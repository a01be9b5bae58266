use crate::bucket::Granularity;
use crate::cache::DEFAULT_CAPACITY;
use crate::model::GroupMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tune-history";
const SETTINGS_FILE: &str = "settings.json";
pub const CONFIG_DIR_ENV: &str = "TUNE_HISTORY_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache_capacity: usize,
    /// Adds a content digest to cache keys so equal-length inputs never share results.
    pub cache_fingerprint: bool,
    pub page_size: usize,
    pub default_group_mode: GroupMode,
    pub default_granularity: Granularity,
    /// Country code to IANA zone, consulted before the built-in table.
    pub timezone_overrides: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            cache_fingerprint: false,
            page_size: 20,
            default_group_mode: GroupMode::Tracks,
            default_granularity: Granularity::HourOfDay,
            timezone_overrides: HashMap::new(),
        }
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path()?)
}

pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    ensure_config_dir()?;
    let path = settings_path()?;
    save_settings_to_path(&path, settings)?;
    Ok(path)
}

pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings_to_path(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings {
            cache_fingerprint: true,
            default_group_mode: GroupMode::Artists,
            timezone_overrides: HashMap::from([(
                String::from("US"),
                String::from("America/Chicago"),
            )]),
            ..Settings::default()
        };

        save_settings_to_path(&path, &settings).expect("save");
        let loaded = load_settings_from_path(&path).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_file_gives_defaults_and_partial_file_fills_gaps() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        assert_eq!(load_settings_from_path(&path).expect("load"), Settings::default());

        fs::write(&path, r#"{ "page_size": 50, "default_granularity": "month" }"#).expect("write");
        let loaded = load_settings_from_path(&path).expect("load");
        assert_eq!(loaded.page_size, 50);
        assert_eq!(loaded.default_granularity, Granularity::Month);
        assert_eq!(loaded.cache_capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ nope").expect("write");
        let err = load_settings_from_path(&path).expect_err("malformed");
        assert!(err.to_string().contains("failed to parse settings file"));
    }

    #[test]
    fn env_override_wins() {
        let dir = tempdir().expect("tempdir");
        unsafe {
            env::set_var(CONFIG_DIR_ENV, dir.path().to_string_lossy().as_ref());
        }
        let saved = save_settings(&Settings::default()).expect("save");
        assert_eq!(saved, dir.path().join(SETTINGS_FILE));
        assert_eq!(load_settings().expect("load"), Settings::default());
    }
}
