#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, unused)]

//! Logging, span context and metrics shared by the confman binaries.
//! Layout: init.rs (subscriber install), context.rs (span helpers), metrics.rs (Prometheus registry), error.rs.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, request_span};
pub use error::{TelemetryError, TelemetryResult};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
