//! Dispatch, accumulate and commit stages.
//!
//! # Design
//! - The dispatcher task owns the output buffer and hands it to the committer
//!   inside a [`Batch`]; the committer hands it back once the record is
//!   emitted. Ownership moves over channels, so the buffer is never shared.
//! - The sender waits for the buffer to come back before accepting more work,
//!   so at most one batch is in flight.
//! - The committer checkpoints only after the sink accepts the record. A
//!   rejected record is retried with backoff; once retries run out the
//!   committer cancels the pipeline so the cursor is redelivered on restart.
//! - Every blocking point also waits on the shared [`CancellationToken`]. A
//!   batch handed off while shutdown races may be dropped without a record.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use confman_config::ManagerSettings;
use confman_events::{ActionRequest, Cursor, OutboundRecord, RecordSink};
use confman_fsops::{ConfigDescriptor, Mutator};
use confman_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::error::{AppError, AppResult};

/// Inbound request queue depth.
pub const INGRESS_CAPACITY: usize = 100;
/// Batches queued between sender and committer.
pub const HANDOFF_CAPACITY: usize = 1;
/// Returned buffers queued between committer and sender.
pub const RETURN_CAPACITY: usize = 2;
/// Initial capacity of the output buffer.
pub const BUFFER_CAPACITY: usize = 10_000;
/// Inject attempts per batch before the committer gives up.
pub const EMIT_ATTEMPTS: u32 = 4;
/// Delay before the first inject retry; doubles on every further retry.
pub const EMIT_RETRY_DELAY: Duration = Duration::from_millis(25);

/// One handoff unit between the sender and the committer.
#[derive(Debug)]
pub struct Batch {
    /// Last cursor appended to the buffer.
    pub cursor: Cursor,
    /// Requests whose output is in `payload`.
    pub request_count: usize,
    /// Accumulated output bytes.
    pub payload: Vec<u8>,
    /// Descriptor of the request that triggered the flush.
    pub descriptor: ConfigDescriptor,
}

/// Result of [`Accumulator::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered.
    Empty,
    /// The batch was committed and the buffer came back.
    Committed,
    /// Shutdown was signalled while the sender was waiting.
    Cancelled,
}

/// Sender side of the handoff; owns the output buffer between flushes.
pub struct Accumulator {
    buffer: Vec<u8>,
    cursor: Cursor,
    count: usize,
    handoff: mpsc::Sender<Batch>,
    returns: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
    metrics: Metrics,
}

impl Accumulator {
    /// Accumulator bound to the handoff and return channels.
    #[must_use]
    pub fn new(
        handoff: mpsc::Sender<Batch>,
        returns: mpsc::Receiver<Vec<u8>>,
        cancel: CancellationToken,
        metrics: Metrics,
    ) -> Self {
        Self {
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            cursor: Cursor::default(),
            count: 0,
            handoff,
            returns,
            cancel,
            metrics,
        }
    }

    /// Append one request's output and advance the last-seen cursor.
    pub fn append(&mut self, bytes: &[u8], cursor: &Cursor) {
        self.buffer.extend_from_slice(bytes);
        self.count += 1;
        self.cursor.clone_from(cursor);
    }

    /// Bytes buffered since the last flush.
    #[must_use]
    pub const fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Hand the buffer to the committer and wait for it to come back.
    pub async fn flush(&mut self, descriptor: ConfigDescriptor) -> FlushOutcome {
        if self.buffer.is_empty() {
            return FlushOutcome::Empty;
        }

        let batch = Batch {
            cursor: self.cursor.clone(),
            request_count: mem::take(&mut self.count),
            payload: mem::take(&mut self.buffer),
            descriptor,
        };

        self.metrics.batch_sent();
        let sent = tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.handoff.send(batch) => sent.is_ok(),
        };
        if !sent {
            self.metrics.batch_settled();
            return FlushOutcome::Cancelled;
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => FlushOutcome::Cancelled,
            returned = self.returns.recv() => match returned {
                Some(buffer) => {
                    self.buffer = buffer;
                    FlushOutcome::Committed
                }
                None => FlushOutcome::Cancelled,
            },
        }
    }
}

/// Result of [`Committer::commit`].
#[derive(Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The record was accepted and the cursor checkpointed; carries the
    /// cleared buffer.
    Committed(Vec<u8>),
    /// Shutdown was signalled before the sink accepted the record.
    Cancelled,
}

/// Receives batches, emits one record each and returns the buffer.
pub struct Committer {
    sink: Arc<dyn RecordSink>,
    tag: String,
    batches: mpsc::Receiver<Batch>,
    returns: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
    metrics: Metrics,
}

impl Committer {
    /// Committer emitting to `sink` with the constant record `tag`.
    #[must_use]
    pub fn new(
        sink: Arc<dyn RecordSink>,
        tag: impl Into<String>,
        batches: mpsc::Receiver<Batch>,
        returns: mpsc::Sender<Vec<u8>>,
        cancel: CancellationToken,
        metrics: Metrics,
    ) -> Self {
        Self {
            sink,
            tag: tag.into(),
            batches,
            returns,
            cancel,
            metrics,
        }
    }

    /// Commit batches until cancelled or the sender goes away.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Emit`] when a record is still refused after
    /// [`EMIT_ATTEMPTS`] tries. The shared token is cancelled first.
    pub async fn run(mut self) -> AppResult<()> {
        let result = self.commit_all().await;
        if result.is_err() {
            self.cancel.cancel();
        }
        while self.batches.try_recv().is_ok() {
            self.metrics.batch_settled();
            debug!("dropped batch left in handoff");
        }
        debug!("committer stopped");
        result
    }

    async fn commit_all(&mut self) -> AppResult<()> {
        loop {
            let batch = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                next = self.batches.recv() => match next {
                    Some(batch) => batch,
                    None => return Ok(()),
                },
            };

            let CommitOutcome::Committed(buffer) = self.commit(batch).await? else {
                return Ok(());
            };
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                returned = self.returns.send(buffer) => {
                    if returned.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Emit the batch, retrying refused injects, and checkpoint its cursor
    /// once the sink accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Emit`] when every attempt was refused. The cursor
    /// is not advanced.
    pub async fn commit(&self, batch: Batch) -> AppResult<CommitOutcome> {
        let Batch {
            cursor,
            request_count,
            mut payload,
            descriptor,
        } = batch;
        let record = outbound_record(&descriptor, &payload, &self.tag);
        let record_id = record.uuid;

        let mut attempt = 1;
        let mut delay = EMIT_RETRY_DELAY;
        loop {
            let injected = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                result = self.sink.inject(record.clone()) => Some(result),
            };
            let Some(result) = injected else {
                return Ok(self.abandon(&cursor));
            };
            let Err(err) = result else {
                break;
            };

            self.metrics.inc_emit_failure();
            if attempt >= EMIT_ATTEMPTS {
                self.metrics.batch_settled();
                error!(
                    record_id = %record_id,
                    cursor = %cursor,
                    attempts = attempt,
                    error = %err,
                    "giving up on record; checkpoint not advanced"
                );
                return Err(AppError::Emit {
                    cursor: cursor.as_str().to_string(),
                    attempts: attempt,
                    source: err,
                });
            }
            warn!(
                record_id = %record_id,
                cursor = %cursor,
                attempt,
                retry_in = ?delay,
                error = %err,
                "failed to emit record; retrying"
            );
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(self.abandon(&cursor)),
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
            delay *= 2;
        }

        self.sink.update_cursor(&cursor);
        self.metrics.record_commit(payload.len());
        self.metrics.batch_settled();
        debug!(
            record_id = %record_id,
            cursor = %cursor,
            requests = request_count,
            bytes = payload.len(),
            attempts = attempt,
            status = %descriptor.status,
            "batch committed"
        );

        payload.clear();
        Ok(CommitOutcome::Committed(payload))
    }

    fn abandon(&self, cursor: &Cursor) -> CommitOutcome {
        self.metrics.batch_settled();
        debug!(cursor = %cursor, "shutdown before record was accepted; checkpoint not advanced");
        CommitOutcome::Cancelled
    }
}

/// Outbound record for one batch.
///
/// `Ticker` is only populated for interval-driven kinds. Payload bytes are
/// decoded lossily as UTF-8.
#[must_use]
pub fn outbound_record(descriptor: &ConfigDescriptor, payload: &[u8], tag: &str) -> OutboundRecord {
    let ticker = if descriptor.is_interval_driven() {
        descriptor.ticker.map(|seconds| seconds.to_string())
    } else {
        None
    };
    OutboundRecord {
        uuid: Uuid::new_v4(),
        file_name: descriptor.file_name_display(),
        conf_name: descriptor.name.clone(),
        conf_type: descriptor.config_type.clone(),
        conf_category: descriptor.category.clone(),
        ticker,
        status: descriptor.status,
        tag: tag.to_string(),
        payload: String::from_utf8_lossy(payload).into_owned(),
    }
}

/// Entry point wiring the dispatcher and committer tasks.
pub struct Pipeline;

impl Pipeline {
    /// Spawn both tasks on the current runtime.
    #[must_use]
    pub fn spawn(
        mutator: Mutator,
        sink: Arc<dyn RecordSink>,
        settings: &ManagerSettings,
        metrics: Metrics,
        cancel: CancellationToken,
    ) -> PipelineHandle {
        let (requests, ingress) = mpsc::channel(INGRESS_CAPACITY);
        let (handoff, batches) = mpsc::channel(HANDOFF_CAPACITY);
        let (returns_tx, returns_rx) = mpsc::channel(RETURN_CAPACITY);

        let accumulator =
            Accumulator::new(handoff, returns_rx, cancel.clone(), metrics.clone());
        let dispatcher = Dispatcher::new(mutator, accumulator, metrics.clone(), cancel.clone());
        let committer = Committer::new(
            sink,
            settings.tag.clone(),
            batches,
            returns_tx,
            cancel.clone(),
            metrics,
        );

        info!(
            ingress = INGRESS_CAPACITY,
            buffer = BUFFER_CAPACITY,
            "config pipeline starting"
        );
        PipelineHandle {
            requests,
            cancel,
            dispatcher: tokio::spawn(dispatcher.run(ingress)),
            committer: tokio::spawn(committer.run()),
        }
    }
}

/// Handle for feeding and stopping a running pipeline.
pub struct PipelineHandle {
    requests: mpsc::Sender<ActionRequest>,
    cancel: CancellationToken,
    dispatcher: JoinHandle<AppResult<()>>,
    committer: JoinHandle<AppResult<()>>,
}

impl PipelineHandle {
    /// Queue a request, waiting while the ingress queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Pipeline`] once the pipeline has stopped.
    pub async fn submit(&self, request: ActionRequest) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(closed());
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(closed()),
            sent = self.requests.send(request) => sent.map_err(|_| closed()),
        }
    }

    /// Signal every stage to stop at its next blocking point.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the pipeline tasks.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Close ingress, let queued requests drain, and wait for both tasks.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's fatal error, then the committer's, or
    /// [`AppError::TaskJoin`] if a task panicked.
    pub async fn join(self) -> AppResult<()> {
        let Self {
            requests,
            dispatcher,
            committer,
            ..
        } = self;
        drop(requests);

        let dispatched = dispatcher.await.map_err(|source| AppError::TaskJoin {
            task: "dispatcher",
            source,
        })?;
        let committed = committer.await.map_err(|source| AppError::TaskJoin {
            task: "committer",
            source,
        })?;
        dispatched?;
        committed
    }
}

const fn closed() -> AppError {
    AppError::Pipeline {
        operation: "pipeline.submit",
        reason: "closed",
    }
}
