#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs
)]

//! Binary entrypoint: serves JSON-lines action requests on stdin.

use confman_app::{AppResult, run_app};

/// Bootstraps the config manager and blocks until input ends or Ctrl-C.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
