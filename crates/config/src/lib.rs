//! Configuration directory handling for gmail-read
//!
//! Resolves the per-user config directory (~/.gmail-read/, or the directory
//! named by `GMAIL_READ_HOME`) and provides JSON load/save helpers for the
//! files kept there.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config directory
pub const HOME_ENV: &str = "GMAIL_READ_HOME";

/// Directory name used under the user's home directory
const DIR_NAME: &str = ".gmail-read";

/// Get the gmail-read config directory
///
/// `GMAIL_READ_HOME` wins when set and non-empty, otherwise ~/.gmail-read/.
pub fn config_dir() -> Option<PathBuf> {
    config_dir_from(std::env::var_os(HOME_ENV))
}

/// Resolve the config directory from an optional override
pub fn config_dir_from(home_override: Option<OsString>) -> Option<PathBuf> {
    match home_override {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|p| p.join(DIR_NAME)),
    }
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Ensure a directory exists
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))
}

/// Save a value as pretty JSON, replacing `path` atomically
///
/// The value is written to a temporary file in the same directory which is
/// then renamed over the target, so readers never observe a truncated file.
/// On Unix the resulting file is only readable by its owner.
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;

    let content = serde_json::to_string_pretty(value)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    restrict_permissions(tmp.path())?;

    tmp.persist(path)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    log::debug!("Saved {}", path.display());
    Ok(())
}

/// Remove a file if present
pub fn remove_file(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
