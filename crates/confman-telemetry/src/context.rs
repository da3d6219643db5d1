//! Span helpers for the application and per-request context.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the `app` span carrying `mode` and the build SHA.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Span wrapping the processing of one inbound request.
#[must_use]
pub fn request_span(action: &str, cursor: &str) -> Span {
    tracing::info_span!("request", action = %action, cursor = %cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_and_request_span_construct_without_subscriber() {
        let _guard = GlobalContextGuard::new("test");
        let span = request_span("add", "42");
        let _entered = span.enter();
        tracing::info!("inside request span");
    }
}
