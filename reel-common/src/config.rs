//! Show file location and TOML loading
//!
//! Show file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`~/.config/reel/show.toml` on Linux)
//! 4. System config (`/etc/reel/show.toml`, Linux only)
//!
//! A show file that cannot be found is not an error: callers fall back to
//! built-in defaults and log a warning.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application directory name under the platform config dir
pub const APP_DIR: &str = "reel";

/// Show file name
pub const SHOW_FILE: &str = "show.toml";

/// Environment variable naming an explicit show file
pub const CONFIG_ENV_VAR: &str = "REEL_CONFIG";

/// Resolve the show file path
///
/// Returns `None` when no candidate exists. An explicit CLI or environment
/// path is returned even if missing, so the caller can report it.
pub fn resolve_show_file(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: platform locations
    default_show_file_candidates()
        .into_iter()
        .find(|candidate| candidate.exists())
}

/// Platform locations searched when no explicit path is given
pub fn default_show_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR).join(SHOW_FILE));
    }

    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(APP_DIR).join(SHOW_FILE));
    }

    candidates
}

/// Read and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!(path = %path.display(), "Reading TOML file");
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_wins() {
        let path = PathBuf::from("/tmp/reel-cli-show.toml");
        let resolved = resolve_show_file(Some(&path), "REEL_CONFIG_UNIT_TEST_UNSET");
        assert_eq!(resolved, Some(path));
    }

    #[test]
    fn test_candidates_end_with_show_file() {
        for candidate in default_show_file_candidates() {
            assert!(candidate.ends_with(Path::new(APP_DIR).join(SHOW_FILE)));
        }
    }
}
