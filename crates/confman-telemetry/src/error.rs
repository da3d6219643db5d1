//! Error types for telemetry setup.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Failures raised while installing logging or operating the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// The requested log format name is not known.
    #[error("unknown log format")]
    UnknownLogFormat {
        /// Name that failed to parse.
        value: String,
    },
    /// A collector could not be constructed.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Collector name.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: prometheus::Error,
    },
    /// A collector could not be registered.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Collector name.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: prometheus::Error,
    },
    /// Encoding the registry failed.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Underlying Prometheus error.
        #[source]
        source: prometheus::Error,
    },
    /// The encoded exposition was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Underlying conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn messages_are_constant_and_sources_chain() -> anyhow::Result<()> {
        let Err(utf8) = String::from_utf8(vec![0, 159]) else {
            anyhow::bail!("expected utf8 error");
        };
        let cases = vec![
            (
                TelemetryError::MetricsCollector {
                    name: "cm_requests_total",
                    source: prometheus::Error::Msg("collector".to_string()),
                },
                "failed to build metrics collector",
            ),
            (
                TelemetryError::MetricsRegister {
                    name: "cm_requests_total",
                    source: prometheus::Error::AlreadyReg,
                },
                "failed to register metrics collector",
            ),
            (
                TelemetryError::MetricsEncode {
                    source: prometheus::Error::Msg("encode".to_string()),
                },
                "failed to encode metrics",
            ),
            (
                TelemetryError::MetricsUtf8 { source: utf8 },
                "metrics output was not valid utf-8",
            ),
        ];
        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
            assert!(err.source().is_some());
        }

        let unknown = TelemetryError::UnknownLogFormat {
            value: "xml".to_string(),
        };
        assert_eq!(unknown.to_string(), "unknown log format");
        assert!(unknown.source().is_none());
        Ok(())
    }
}
