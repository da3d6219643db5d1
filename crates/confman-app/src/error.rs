//! # Design
//!
//! - Centralize application-level errors for bootstrap and the pipeline tasks.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Per-request failures never reach this type; they become ERROR records.

use std::io;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Loading or validating configuration failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: confman_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: confman_telemetry::TelemetryError,
    },
    /// A store operation failed in a way that stops the pipeline.
    #[error("config store operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source store error.
        source: confman_fsops::FsOpsError,
    },
    /// The pipeline refused work.
    #[error("pipeline unavailable")]
    Pipeline {
        /// Operation identifier.
        operation: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// A pipeline task panicked or was aborted.
    #[error("pipeline task failed")]
    TaskJoin {
        /// Task name.
        task: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
    /// Host stream IO failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// The host kept refusing a record after every retry.
    #[error("record emission failed")]
    Emit {
        /// Cursor left uncheckpointed.
        cursor: String,
        /// Emission attempts made.
        attempts: u32,
        /// Last sink error.
        source: confman_events::SinkError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: confman_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: confman_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: confman_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }

    pub(crate) const fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::path::PathBuf;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load",
            confman_config::ConfigError::Read {
                path: PathBuf::from("/etc/confman.toml"),
                source: io::Error::other("denied"),
            },
        );
        assert!(matches!(config, AppError::Config { operation: "config.load", .. }));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let telemetry = AppError::telemetry(
            "telemetry.metrics",
            confman_telemetry::TelemetryError::UnknownLogFormat {
                value: "xml".to_string(),
            },
        );
        assert!(matches!(telemetry, AppError::Telemetry { .. }));

        let fsops = AppError::fsops(
            "list.walk",
            confman_fsops::FsOpsError::NotFound {
                path: PathBuf::from("/missing"),
            },
        );
        assert_eq!(fsops.to_string(), "config store operation failed");

        let io_error = AppError::io("stdin.read", io::Error::other("closed"));
        assert!(io_error.source().is_some());

        let emit = AppError::Emit {
            cursor: "7".to_string(),
            attempts: 4,
            source: confman_events::SinkError::Closed {
                record_id: uuid::Uuid::nil(),
            },
        };
        assert_eq!(emit.to_string(), "record emission failed");
        assert!(emit.source().is_some());

        let pipeline = AppError::Pipeline {
            operation: "pipeline.submit",
            reason: "closed",
        };
        assert!(pipeline.source().is_none());
    }
}
