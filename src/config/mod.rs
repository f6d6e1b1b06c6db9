//! Configuration module for the sourcing pipeline
//!
//! Handles loading and validating settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file path
pub const SETTINGS_PATH_ENV: &str = "SOURCING_SETTINGS_PATH";

/// Load settings from the first location that exists, then merge in
/// environment overrides. Falls back to defaults when no file is found.
pub fn load_settings() -> Result<Settings> {
    let mut settings = match find_settings_file() {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    settings.merge_env();
    Ok(settings)
}

fn find_settings_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(SETTINGS_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }
    let local = Path::new("settings.yml");
    if local.exists() {
        return Some(local.to_path_buf());
    }
    if let Some(config_dir) = dirs::config_dir() {
        let candidate = config_dir.join("sourcing").join("settings.yml");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
