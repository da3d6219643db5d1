//! Request dispatch: decode the action, run it against the store, flush the output.
//!
//! Every request produces output and a flush, one batch per request. A
//! `return` request flushes once per listed file. Request-level failures
//! become ERROR records; only a walk failure while listing stops the loop.

use std::path::PathBuf;

use confman_events::{Action, ActionRequest, FieldValue, Status};
use confman_fsops::{ConfigDescriptor, MutationResult, Mutator};
use confman_telemetry::{Metrics, request_span};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::pipeline::{Accumulator, FlushOutcome};

/// Field naming the file a delete targets.
pub const FILENAME_FIELD: &str = "Filename";
/// Optional add field requesting overwrite of a duplicate.
pub const OVERWRITE_FIELD: &str = "Overwrite";
/// Payload returned for unknown actions.
pub const UNRECOGNIZED_ACTION_MESSAGE: &str =
    "ERROR Applying Configuration: You must supply an action(add, delete, return)";

/// Problems with the request fields themselves.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// A required field was absent.
    #[error("required request field missing")]
    MissingField {
        /// Field name.
        field: &'static str,
    },
    /// A field had the wrong type or an unparseable value.
    #[error("invalid request field")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
        /// Offending value or its type.
        value: String,
    },
}

impl RequestError {
    /// Payload reported to the host.
    #[must_use]
    pub fn report(&self) -> String {
        match self {
            Self::MissingField { field } if *field == FILENAME_FIELD => {
                "You must specify a 'Filename' Field when deleting.".to_string()
            }
            Self::MissingField { field } => format!("You must specify a '{field}' Field."),
            Self::InvalidField {
                field,
                reason,
                value,
            } => format!("Invalid '{field}' Field: {reason} ({value})"),
        }
    }
}

/// Parse a boolean the way the host encodes them in string fields.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Read the optional overwrite flag; absent means `false`.
///
/// # Errors
///
/// Returns [`RequestError::InvalidField`] for non-boolean values.
pub fn overwrite_flag(request: &ActionRequest) -> Result<bool, RequestError> {
    match request.field(OVERWRITE_FIELD) {
        None => Ok(false),
        Some(FieldValue::Bool(flag)) => Ok(*flag),
        Some(FieldValue::String(text)) => {
            parse_bool(text).ok_or_else(|| RequestError::InvalidField {
                field: OVERWRITE_FIELD,
                reason: "not_a_bool",
                value: text.clone(),
            })
        }
        Some(other) => Err(RequestError::InvalidField {
            field: OVERWRITE_FIELD,
            reason: "wrong_type",
            value: other.type_name().to_string(),
        }),
    }
}

/// Read the required delete target.
///
/// # Errors
///
/// Returns [`RequestError::MissingField`] when absent or empty, and
/// [`RequestError::InvalidField`] when not a string.
pub fn delete_target(request: &ActionRequest) -> Result<PathBuf, RequestError> {
    match request.field(FILENAME_FIELD) {
        Some(FieldValue::String(path)) if !path.is_empty() => Ok(PathBuf::from(path)),
        None | Some(FieldValue::String(_)) => Err(RequestError::MissingField {
            field: FILENAME_FIELD,
        }),
        Some(other) => Err(RequestError::InvalidField {
            field: FILENAME_FIELD,
            reason: "wrong_type",
            value: other.type_name().to_string(),
        }),
    }
}

/// Output of one add, delete, or rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutput {
    /// Descriptor carried on the record.
    pub descriptor: ConfigDescriptor,
    /// Record payload.
    pub payload: String,
}

impl RequestOutput {
    fn rejected(payload: String) -> Self {
        Self {
            descriptor: ConfigDescriptor {
                status: Status::Error,
                ..ConfigDescriptor::default()
            },
            payload,
        }
    }

    fn from_mutation(result: MutationResult) -> Self {
        match result {
            Ok(outcome) => Self {
                descriptor: outcome.descriptor,
                payload: outcome.message,
            },
            Err(failure) => {
                let payload = failure.report();
                Self {
                    descriptor: failure.descriptor,
                    payload,
                }
            }
        }
    }
}

/// Dispatcher loop combined with the sending half of the handoff.
pub struct Dispatcher {
    mutator: Mutator,
    accumulator: Accumulator,
    metrics: Metrics,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Dispatcher running requests against `mutator`.
    #[must_use]
    pub const fn new(
        mutator: Mutator,
        accumulator: Accumulator,
        metrics: Metrics,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            mutator,
            accumulator,
            metrics,
            cancel,
        }
    }

    /// Process requests until ingress closes or shutdown is signalled.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::FsOps`] when listing hits a walk error; the shared
    /// token is cancelled first so every stage stops.
    pub async fn run(mut self, mut requests: mpsc::Receiver<ActionRequest>) -> AppResult<()> {
        loop {
            let request = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                next = requests.recv() => match next {
                    Some(request) => request,
                    None => break,
                },
            };

            let span = request_span(request.action().label(), request.cursor.as_str());
            if self.dispatch(request).instrument(span).await? == FlushOutcome::Cancelled {
                break;
            }
        }
        debug!("dispatcher stopped");
        Ok(())
    }

    /// Run one request through the store and flush its output.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::FsOps`] on a walk error while listing.
    pub async fn dispatch(&mut self, request: ActionRequest) -> AppResult<FlushOutcome> {
        let action = request.action();
        let output = match &action {
            Action::Add => match overwrite_flag(&request) {
                Ok(overwrite) => {
                    RequestOutput::from_mutation(self.mutator.add(&request.payload, overwrite))
                }
                Err(err) => RequestOutput::rejected(err.report()),
            },
            Action::Delete => match delete_target(&request) {
                Ok(target) => RequestOutput::from_mutation(self.mutator.delete(&target)),
                Err(err) => RequestOutput::rejected(err.report()),
            },
            Action::List => return self.list(&request).await,
            Action::Unrecognized(raw) => {
                warn!(action = %raw, "unrecognized action");
                RequestOutput::rejected(UNRECOGNIZED_ACTION_MESSAGE.to_string())
            }
        };

        let status = output.descriptor.status;
        self.metrics.inc_request(action.label(), status.as_str());
        info!(
            status = %status,
            file = %output.descriptor.file_name_display(),
            bytes = output.payload.len(),
            "request processed"
        );

        self.accumulator
            .append(output.payload.as_bytes(), &request.cursor);
        Ok(self.accumulator.flush(output.descriptor).await)
    }

    async fn list(&mut self, request: &ActionRequest) -> AppResult<FlushOutcome> {
        let mut listed = 0_usize;
        for item in self.mutator.list() {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    error!(error = %err, report = %err.report(), "listing failed; shutting down");
                    self.metrics.inc_request(Action::List.label(), Status::Error.as_str());
                    self.cancel.cancel();
                    return Err(AppError::fsops("list.walk", err));
                }
            };

            listed += 1;
            self.metrics.inc_listed_file();
            debug!(
                file = %item.descriptor.file_name_display(),
                status = %item.descriptor.status,
                "listed config"
            );
            self.accumulator.append(&item.payload, &request.cursor);
            if self.accumulator.flush(item.descriptor).await == FlushOutcome::Cancelled {
                return Ok(FlushOutcome::Cancelled);
            }
        }

        self.metrics
            .inc_request(Action::List.label(), Status::Ok.as_str());
        info!(files = listed, "listing complete");
        Ok(if listed == 0 {
            FlushOutcome::Empty
        } else {
            FlushOutcome::Committed
        })
    }
}
