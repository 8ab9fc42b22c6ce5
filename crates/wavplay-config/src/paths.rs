//! Platform-specific configuration paths.
//!
//! - Linux: `~/.config/wavplay/config.toml`
//! - macOS: `~/Library/Application Support/wavplay/config.toml`
//! - Windows: `%APPDATA%\wavplay\config.toml`

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "wavplay";

/// File name of the player configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path under the current directory if the platform
/// config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the default location of the player configuration file.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE_NAME)
}

/// Resolve which configuration file to load.
///
/// An explicit path always wins, whether or not it exists (a missing explicit
/// file is an error for the caller to report). Otherwise the default path is
/// used only if a file is present there.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = default_config_path();
            default.is_file().then_some(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_config_dir_ends_with_app_name() {
        let dir = user_config_dir();
        assert!(dir.ends_with(APP_NAME), "got {dir:?}");
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert_eq!(path.file_name().unwrap(), CONFIG_FILE_NAME);
        assert_eq!(path.parent().unwrap(), user_config_dir());
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/nonexistent/custom.toml");
        assert_eq!(
            resolve_config_path(Some(explicit)),
            Some(explicit.to_path_buf())
        );
    }
}
