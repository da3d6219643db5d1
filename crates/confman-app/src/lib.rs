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

//! Config manager application wiring.
//!
//! Layout: `dispatcher.rs` (per-request state machine), `pipeline.rs`
//! (accumulator, committer, task wiring), `bootstrap.rs` (environment and
//! host stream adapter).

/// Application bootstrap and host stream adapter.
pub mod bootstrap;
/// Request dispatch against the config store.
pub mod dispatcher;
/// Application error types.
pub mod error;
/// Accumulate and commit stages.
pub mod pipeline;

pub use bootstrap::{BootstrapDependencies, run_app, serve};
pub use dispatcher::{Dispatcher, RequestError, parse_bool};
pub use error::{AppError, AppResult};
pub use pipeline::{
    Accumulator, Batch, CommitOutcome, Committer, FlushOutcome, Pipeline, PipelineHandle,
    outbound_record,
};
