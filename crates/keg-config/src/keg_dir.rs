//! Discovery and management of the keg home directory.
//!
//! The keg home holds `config.yaml`, the download cache, local formulae and
//! (unless `root` is configured) the `Cellar/`. It is `$KEG_HOME` when set,
//! otherwise `~/.keg`.

use crate::config::ConfigError;
use std::path::{Path, PathBuf};

/// The name of the keg home directory under the user's home.
const KEG_DIR_NAME: &str = ".keg";

/// The name of the environment variable that overrides the keg home.
pub const KEG_HOME_ENV: &str = "KEG_HOME";

/// Locate the keg home from the environment.
///
/// Returns `None` only when neither `KEG_HOME` nor `HOME` is set.
pub fn find_keg_home() -> Option<PathBuf> {
    resolve_keg_home(std::env::var_os(KEG_HOME_ENV).map(PathBuf::from), home_dir())
}

/// Like [`find_keg_home`], converting `None` into
/// [`ConfigError::HomeNotFound`].
pub fn keg_home() -> Result<PathBuf, ConfigError> {
    find_keg_home().ok_or(ConfigError::HomeNotFound)
}

fn resolve_keg_home(env_dir: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    match env_dir {
        Some(dir) if !dir.as_os_str().is_empty() => Some(dir),
        _ => home.map(|h| h.join(KEG_DIR_NAME)),
    }
}

/// Ensure a directory (and its parents) exists, returning its path.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if directory creation fails.
pub fn ensure_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
