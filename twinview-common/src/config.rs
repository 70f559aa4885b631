//! Configuration file resolution
//!
//! Locates the TOML configuration file following this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/twinview/config.toml`)
//!
//! When none of these yields an existing file the caller falls back to
//! built-in defaults. A missing configuration file is never fatal.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "TWINVIEW_CONFIG";

/// Application directory name under the platform config dir
const APP_DIR: &str = "twinview";

/// Config file name inside the application directory
const CONFIG_FILE: &str = "config.toml";

/// Where a resolved configuration path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    PlatformDefault,
}

/// Configuration file resolver
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env_var_name: String,
}

impl ConfigResolver {
    /// Create a resolver reading the default `TWINVIEW_CONFIG` variable
    pub fn new() -> Self {
        Self::with_env_var(CONFIG_ENV_VAR)
    }

    /// Create a resolver reading a custom environment variable
    pub fn with_env_var(env_var_name: &str) -> Self {
        Self {
            env_var_name: env_var_name.to_string(),
        }
    }

    /// Resolve the configuration file path
    ///
    /// Returns `None` when no configuration file is available, in which case
    /// built-in defaults apply. A CLI or environment path that does not exist
    /// is logged and skipped so that the next source can be tried.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            if path.exists() {
                return Some((path.to_path_buf(), ConfigSource::CommandLine));
            }
            warn!("Config file {} (from command line) does not exist", path.display());
        }

        // Priority 2: Environment variable
        if let Ok(value) = std::env::var(&self.env_var_name) {
            let path = PathBuf::from(value);
            if path.exists() {
                return Some((path, ConfigSource::Environment));
            }
            warn!(
                "Config file {} (from {}) does not exist",
                path.display(),
                self.env_var_name
            );
        }

        // Priority 3: Platform config directory
        match default_config_path() {
            Some(path) if path.exists() => Some((path, ConfigSource::PlatformDefault)),
            Some(path) => {
                debug!("No config file at {}, using built-in defaults", path.display());
                None
            }
            None => None,
        }
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform-dependent default configuration file path
///
/// - Linux: `~/.config/twinview/config.toml`
/// - macOS: `~/Library/Application Support/twinview/config.toml`
/// - Windows: `%APPDATA%\twinview\config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// Read and deserialize a TOML file
///
/// A missing or unreadable file is an I/O error; malformed content is a
/// configuration error naming the file.
pub async fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path).await?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_ends_with_app_file() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("twinview/config.toml"));
        }
    }

    #[tokio::test]
    async fn test_read_toml_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let result: Result<toml::Value> = read_toml(&path).await;
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("bad.toml")));
    }

    #[tokio::test]
    async fn test_read_toml_missing_file_is_io_error() {
        let result: Result<toml::Value> = read_toml(Path::new("/nonexistent/twinview.toml")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
