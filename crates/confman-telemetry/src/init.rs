//! Subscriber installation and logging configuration.
//!
//! # Design
//! - One entry point installs the global subscriber (pretty or JSON).
//! - The build SHA is recorded once so every span reports the same value.

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{TelemetryError, TelemetryResult};

/// Default filter directive when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] if a global subscriber has
/// already been set.
pub fn init_logging(config: &LoggingConfig) -> TelemetryResult<()> {
    BUILD_SHA
        .set(config.build_sha.to_string())
        .ok()
        .or(Some(()));

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(build_env_filter(config.level))
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(build_env_filter(config.level))
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// Build SHA recorded during logging initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`).
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
    /// Build identifier recorded in the application span.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty in debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse `json` or `pretty` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::UnknownLogFormat`] for any other name.
    pub fn from_name(name: &str) -> TelemetryResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(TelemetryError::UnknownLogFormat {
                value: name.to_string(),
            }),
        }
    }

    /// Resolve an optional configured name, inferring when absent.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::UnknownLogFormat`] when a name is given but not recognised.
    pub fn from_setting(name: Option<&str>) -> TelemetryResult<Self> {
        name.map_or_else(|| Ok(Self::infer()), Self::from_name)
    }
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_names_parse() -> anyhow::Result<()> {
        assert_eq!(LogFormat::from_name("json")?, LogFormat::Json);
        assert_eq!(LogFormat::from_name(" Pretty ")?, LogFormat::Pretty);
        assert!(matches!(
            LogFormat::from_name("xml"),
            Err(TelemetryError::UnknownLogFormat { value }) if value == "xml"
        ));
        assert_eq!(LogFormat::from_setting(None)?, LogFormat::infer());
        assert_eq!(LogFormat::from_setting(Some("json"))?, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn default_config_uses_info_level() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.format, LogFormat::infer());
    }

    #[test]
    fn second_install_is_rejected() {
        let config = LoggingConfig {
            level: "debug",
            format: LogFormat::Json,
            build_sha: "abc123",
        };
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(first.is_err() || second.is_err());
        assert!(matches!(
            second,
            Err(TelemetryError::SubscriberInstall { .. })
        ));
    }
}
