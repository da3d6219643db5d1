//! Error types for configuration operations.
//!
//! # Design
//! - Constant messages; offending values travel in context fields.
//! - Source errors are preserved for the caller to render.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Reading the configuration file failed.
    #[error("failed to read configuration file")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The configuration file was not valid TOML for the expected schema.
    #[error("failed to parse configuration file")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Source TOML error.
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub(crate) const fn invalid(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidField {
            field,
            reason,
            value,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn invalid_helper_builds_variant_without_source() {
        let err = ConfigError::invalid("cm_tag", "empty", None);
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "cm_tag",
                reason: "empty",
                value: None
            }
        ));
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "invalid configuration field");
    }

    #[test]
    fn read_error_exposes_source() {
        let err = ConfigError::Read {
            path: PathBuf::from("/missing.toml"),
            source: io::Error::other("io"),
        };
        assert!(err.source().is_some());
    }
}
