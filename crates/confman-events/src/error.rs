//! Record sink error primitives.

use std::io;

use thiserror::Error;
use uuid::Uuid;

/// Error emitted when the host refuses or cannot accept an outbound record.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The host side of the sink has shut down.
    #[error("record sink closed")]
    Closed {
        /// Identifier of the record that could not be delivered.
        record_id: Uuid,
    },
    /// The host rejected the record.
    #[error("record rejected by sink")]
    Rejected {
        /// Identifier of the rejected record.
        record_id: Uuid,
        /// Host-supplied reason.
        reason: String,
    },
    /// The record could not be serialised.
    #[error("failed to encode record")]
    Encode {
        /// Identifier of the record.
        record_id: Uuid,
        /// Underlying serialisation failure.
        #[source]
        source: serde_json::Error,
    },
    /// Writing the record to the host stream failed.
    #[error("failed to write record")]
    Write {
        /// Identifier of the record.
        record_id: Uuid,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
}

impl SinkError {
    /// Identifier of the record involved in the failure.
    #[must_use]
    pub const fn record_id(&self) -> Uuid {
        match self {
            Self::Closed { record_id }
            | Self::Rejected { record_id, .. }
            | Self::Encode { record_id, .. }
            | Self::Write { record_id, .. } => *record_id,
        }
    }

    /// Map a write failure, treating a vanished reader as a closed sink.
    pub(crate) fn write(record_id: Uuid, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::WriteZero => Self::Closed { record_id },
            _ => Self::Write { record_id, source },
        }
    }
}

/// Result wrapper for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
