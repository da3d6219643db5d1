//! Configuration loading from TOML files and the process environment.
//!
//! # Design
//! - The file is optional; without one the built-in defaults apply.
//! - Environment lookups are injectable so callers and tests avoid mutating process state.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::ManagerConfig;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "CONFMAN_CONFIG";
/// Environment variable overriding `share_dir`.
pub const SHARE_DIR_ENV: &str = "CONFMAN_SHARE_DIR";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Loaded from the given file.
    File(PathBuf),
    /// Built-in defaults.
    Default,
}

/// Loader for [`ManagerConfig`] documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read and parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid configuration document.
    pub fn load_file(path: &Path) -> ConfigResult<ManagerConfig> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&contents, path)
    }

    /// Parse a TOML configuration document; `origin` is only used for error context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn parse_str(contents: &str, origin: &Path) -> ConfigResult<ManagerConfig> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load the configuration using the process environment.
    ///
    /// # Errors
    ///
    /// Propagates file read and parse failures.
    pub fn from_env() -> ConfigResult<(ManagerConfig, ConfigSource)> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the configuration using an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Propagates file read and parse failures.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<(ManagerConfig, ConfigSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let (mut config, source) = match non_blank(CONFIG_PATH_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                let config = Self::load_file(&path)?;
                info!(path = %path.display(), "loaded configuration file");
                (config, ConfigSource::File(path))
            }
            None => {
                debug!("no configuration file supplied; using defaults");
                (ManagerConfig::default(), ConfigSource::Default)
            }
        };

        if let Some(share_dir) = non_blank(SHARE_DIR_ENV) {
            config.share_dir = PathBuf::from(share_dir);
        }

        Ok((config, source))
    }
}
