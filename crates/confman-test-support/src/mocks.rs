//! In-memory host sink for pipeline tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use confman_events::{Cursor, OutboundRecord, RecordSink, SinkError, SinkResult};

#[derive(Default)]
struct SinkState {
    records: Vec<OutboundRecord>,
    cursors: Vec<Cursor>,
    attempts: usize,
    failures_remaining: usize,
}

/// Sink that records every record and checkpoint, optionally rejecting injects.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    /// Empty sink accepting every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` injects.
    pub fn fail_next(&self, count: usize) {
        self.lock().failures_remaining = count;
    }

    /// Records accepted so far.
    #[must_use]
    pub fn records(&self) -> Vec<OutboundRecord> {
        self.lock().records.clone()
    }

    /// Cursors checkpointed so far, in order.
    #[must_use]
    pub fn cursors(&self) -> Vec<Cursor> {
        self.lock().cursors.clone()
    }

    /// Most recent checkpoint.
    #[must_use]
    pub fn last_cursor(&self) -> Option<Cursor> {
        self.lock().cursors.last().cloned()
    }

    /// Inject calls seen, including rejected ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn inject(&self, record: OutboundRecord) -> SinkResult<()> {
        let mut state = self.lock();
        state.attempts += 1;
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(SinkError::Rejected {
                record_id: record.uuid,
                reason: "injected failure".to_string(),
            });
        }
        state.records.push(record);
        Ok(())
    }

    fn update_cursor(&self, cursor: &Cursor) {
        self.lock().cursors.push(cursor.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confman_events::Status;
    use uuid::Uuid;

    fn record() -> OutboundRecord {
        OutboundRecord {
            uuid: Uuid::new_v4(),
            file_name: String::new(),
            conf_name: String::new(),
            conf_type: String::new(),
            conf_category: String::new(),
            ticker: None,
            status: Status::Ok,
            tag: "CM".to_string(),
            payload: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let sink = RecordingSink::new();
        sink.fail_next(1);
        assert!(sink.inject(record()).await.is_err());
        assert!(sink.inject(record()).await.is_ok());
        assert_eq!(sink.attempts(), 2);
        assert_eq!(sink.records().len(), 1);

        sink.update_cursor(&Cursor::new("7"));
        assert_eq!(sink.last_cursor(), Some(Cursor::new("7")));
        assert_eq!(sink.cursors().len(), 1);
    }
}
