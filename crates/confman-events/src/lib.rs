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

//! Host interface for the config manager.
//!
//! Inbound requests and outbound records are plain serde types. Emission goes
//! through the [`RecordSink`] trait. [`JsonLinesSink`] implements it over any
//! async writer: `inject` resolves only once the line has been written and
//! flushed, so a slow reader holds the committer back instead of losing
//! records.

pub mod error;
pub mod payloads;

use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

pub use error::{SinkError, SinkResult};
pub use payloads::{Action, ActionRequest, Cursor, FieldValue, OutboundRecord, Status};

#[async_trait]
/// Host-side emission interface consumed by the committer.
pub trait RecordSink: Send + Sync {
    /// Emit one outbound record. Resolves once the host has accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the host cannot accept the record.
    async fn inject(&self, record: OutboundRecord) -> SinkResult<()>;

    /// Advance the host checkpoint to `cursor`.
    fn update_cursor(&self, cursor: &Cursor);
}

/// Sink writing one JSON object per line and remembering the last checkpoint.
pub struct JsonLinesSink<W> {
    output: Mutex<W>,
    checkpoint: StdMutex<Option<Cursor>>,
}

impl<W> JsonLinesSink<W> {
    /// Sink writing to `output`.
    #[must_use]
    pub fn new(output: W) -> Self {
        Self {
            output: Mutex::new(output),
            checkpoint: StdMutex::new(None),
        }
    }

    /// Most recent checkpoint cursor, if any record has been committed.
    #[must_use]
    pub fn checkpoint(&self) -> Option<Cursor> {
        lock(&self.checkpoint).clone()
    }

    /// Release the underlying writer.
    pub fn into_inner(self) -> W {
        self.output.into_inner()
    }
}

#[async_trait]
impl<W> RecordSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn inject(&self, record: OutboundRecord) -> SinkResult<()> {
        let record_id = record.uuid;
        let mut line = serde_json::to_vec(&record)
            .map_err(|source| SinkError::Encode { record_id, source })?;
        line.push(b'\n');

        let mut output = self.output.lock().await;
        output
            .write_all(&line)
            .await
            .map_err(|source| SinkError::write(record_id, source))?;
        output
            .flush()
            .await
            .map_err(|source| SinkError::write(record_id, source))
    }

    fn update_cursor(&self, cursor: &Cursor) {
        *lock(&self.checkpoint) = Some(cursor.clone());
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_record(name: &str) -> OutboundRecord {
        OutboundRecord {
            uuid: Uuid::new_v4(),
            file_name: format!("/etc/confman/http.d/{name}.toml"),
            conf_name: name.to_string(),
            conf_type: "HttpInput".to_string(),
            conf_category: "Input".to_string(),
            ticker: None,
            status: Status::Ok,
            tag: "CM".to_string(),
            payload: format!("[{name}]\ntype = \"HttpInput\"\n"),
        }
    }

    #[tokio::test]
    async fn records_are_written_one_per_line() -> Result<(), Box<dyn std::error::Error>> {
        let sink = JsonLinesSink::new(Vec::new());
        sink.inject(sample_record("alpha")).await?;
        sink.inject(sample_record("beta")).await?;

        let text = String::from_utf8(sink.into_inner())?;
        let names: Vec<String> = text
            .lines()
            .map(serde_json::from_str::<OutboundRecord>)
            .map(|record| record.map(|record| record.conf_name))
            .collect::<Result<_, _>>()?;
        assert_eq!(names, ["alpha", "beta"]);
        assert!(text.ends_with('\n'));
        Ok(())
    }

    #[test]
    fn checkpoint_tracks_the_latest_cursor() {
        let sink = JsonLinesSink::new(Vec::new());
        assert!(sink.checkpoint().is_none());
        sink.update_cursor(&Cursor::new("41"));
        sink.update_cursor(&Cursor::new("42"));
        assert_eq!(sink.checkpoint(), Some(Cursor::new("42")));
    }

    #[tokio::test]
    async fn dropped_reader_reports_closed() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let sink = JsonLinesSink::new(writer);

        let record = sample_record("gone");
        let id = record.uuid;
        let Err(err) = sink.inject(record).await else {
            panic!("expected closed sink");
        };
        assert!(matches!(err, SinkError::Closed { .. }));
        assert_eq!(err.record_id(), id);
    }
}
