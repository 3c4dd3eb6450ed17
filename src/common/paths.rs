//! Configuration and session paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/steprunner/`
//! - macOS: `~/Library/Application Support/steprunner/`
//! - Windows: `%APPDATA%\steprunner\`

use std::io;
use std::path::PathBuf;

/// Application name used for all directories
const APP_NAME: &str = "steprunner";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the saved session file
pub fn session_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().join("session.json"))
}

/// Ensure the parent directory of `path` exists
pub fn ensure_parent(path: &std::path::Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
