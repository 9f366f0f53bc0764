//! The consumer side of a stream.
//!
//! [`ChunkEnumerator`] pulls chunks off the hand-off queue and flattens them
//! into one sequence of rows. The consumer only ever blocks inside a bounded
//! `try_take`, so between two waits it can notice a producer fault, the end of
//! the data, or the caller's cancellation.
//!
//! Fault timing: rows the producer handed off before failing are still
//! delivered. Once a fault is recorded the enumerator stops waiting and drains
//! what is already queued without blocking; the next pull after that raises
//! the fault as a [`DataSourceError`].

use crate::cancel::StreamCancellation;
use crate::chunk::Chunk;
use crate::config::StreamConfig;
use crate::error::DataSourceError;
use crate::fault::{FaultCell, FaultState};
use crate::metrics::{
    CHUNK_SIZE, CHUNKS_RECEIVED, EMPTY_CHUNKS_SKIPPED, MetricsCollector, POLL_TIMEOUTS,
    PRODUCER_FAULTS, ROWS_YIELDED,
};
use crate::producer::{CollectChunks, ProducerTask};
use crate::queue::HandoffQueue;
use std::iter::FusedIterator;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No producer yet; it is spawned by the first pull.
    NotStarted,
    BetweenChunks,
    WithinChunk,
    /// Terminal. Every further pull reports end-of-sequence.
    Finished,
}

/// Pull-based iterator over the rows of one streaming run.
///
/// Use [`move_next`](Self::move_next) and [`current`](Self::current) for
/// cursor-style access, or the [`Iterator`] impl, which yields
/// `Result<R, DataSourceError>` and stops after the first error.
///
/// Dropping an unfinished enumerator cancels the run; the producer observes
/// that at its next chunk boundary and exits.
pub struct ChunkEnumerator<R> {
    source_name: String,
    config: StreamConfig,
    collector: Arc<dyn CollectChunks<R>>,
    queue: Arc<HandoffQueue<R>>,
    fault: Arc<FaultCell>,
    cancellation: StreamCancellation,
    producer: Option<ProducerTask>,
    state: State,
    rows: std::vec::IntoIter<R>,
    current: Option<R>,
    metrics: Option<MetricsCollector>,
}

impl<R: Send + 'static> ChunkEnumerator<R> {
    pub(crate) fn new(
        source_name: String,
        config: StreamConfig,
        collector: Arc<dyn CollectChunks<R>>,
        cancellation: StreamCancellation,
    ) -> Self {
        let queue = Arc::new(HandoffQueue::new(config.queue_capacity));
        Self {
            source_name,
            config,
            collector,
            queue,
            fault: Arc::new(FaultCell::new()),
            cancellation,
            producer: None,
            state: State::NotStarted,
            rows: Vec::new().into_iter(),
            current: None,
            metrics: None,
        }
    }

    pub(crate) fn with_metrics(mut self, metrics: Option<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Advance to the next row.
    ///
    /// Returns `Ok(true)` when [`current`](Self::current) holds a new row and
    /// `Ok(false)` at the end of the sequence, which is terminal.
    ///
    /// # Errors
    /// [`DataSourceError`] wrapping the producer's fault, raised once. The
    /// enumerator is finished afterwards.
    pub fn move_next(&mut self) -> Result<bool, DataSourceError> {
        self.current = None;
        match self.state {
            State::Finished => return Ok(false),
            State::NotStarted => {
                if !self.start()? {
                    return Ok(false);
                }
            }
            State::WithinChunk => {
                if let Some(row) = self.rows.next() {
                    self.yield_row(row);
                    return Ok(true);
                }
                self.state = State::BetweenChunks;
            }
            State::BetweenChunks => {}
        }
        self.next_chunk()
    }

    /// The row the last successful [`move_next`](Self::move_next) advanced to.
    pub fn current(&self) -> Option<&R> {
        self.current.as_ref()
    }

    /// True once end-of-sequence or a fault has been reported.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    fn start(&mut self) -> Result<bool, DataSourceError> {
        self.record_metric(MetricsCollector::record_start);
        if self.cancellation.is_stop_requested() {
            trace!(source = %self.source_name, "cancelled before first pull");
            self.finish();
            return Ok(false);
        }
        let spawned = ProducerTask::spawn(
            &self.source_name,
            &self.config.thread_name,
            Arc::clone(&self.collector),
            Arc::clone(&self.queue),
            Arc::clone(&self.fault),
            self.cancellation.clone(),
        );
        match spawned {
            Ok(task) => {
                self.producer = Some(task);
                self.state = State::BetweenChunks;
                Ok(true)
            }
            Err(err) => {
                self.finish();
                Err(DataSourceError::new(
                    self.source_name.clone(),
                    Arc::new(anyhow::Error::new(err)),
                ))
            }
        }
    }

    /// Steps 1 and 3: wait for the next non-empty chunk, surfacing a fault or
    /// the end of the sequence along the way.
    fn next_chunk(&mut self) -> Result<bool, DataSourceError> {
        let poll = self.config.poll_interval();
        loop {
            if self.cancellation.is_stop_requested() {
                self.raise_if_faulted()?;
                self.finish();
                return Ok(false);
            }

            // Once the producer has recorded its outcome every chunk it handed
            // off is already queued, so there is nothing worth waiting for.
            let timeout = if self.fault.is_set() { Duration::ZERO } else { poll };
            match self.queue.try_take(timeout) {
                Some(chunk) if chunk.is_empty() => {
                    self.record_metric(|m| m.increment_counter(EMPTY_CHUNKS_SKIPPED, 1));
                }
                Some(chunk) => return Ok(self.enter_chunk(chunk)),
                None => {
                    // Completion is published after the fault, so reading it
                    // first guarantees a fault is never missed.
                    let drained = self.queue.is_drained();
                    self.raise_if_faulted()?;
                    if drained {
                        self.finish();
                        return Ok(false);
                    }
                    if timeout.is_zero() {
                        // outcome recorded, completion flag not yet published
                        std::thread::yield_now();
                    } else {
                        trace!(source = %self.source_name, "poll timed out");
                        self.record_metric(|m| m.increment_counter(POLL_TIMEOUTS, 1));
                    }
                }
            }
        }
    }

    fn enter_chunk(&mut self, chunk: Chunk<R>) -> bool {
        trace!(source = %self.source_name, rows = chunk.len(), "received chunk");
        #[allow(clippy::cast_precision_loss)]
        let size = chunk.len() as f64;
        self.record_metric(|m| {
            m.increment_counter(CHUNKS_RECEIVED, 1);
            m.observe(CHUNK_SIZE, size);
        });
        self.rows = chunk.into_iter();
        self.state = State::WithinChunk;
        match self.rows.next() {
            Some(row) => {
                self.yield_row(row);
                true
            }
            None => false,
        }
    }

    fn yield_row(&mut self, row: R) {
        self.current = Some(row);
        self.record_metric(|m| m.increment_counter(ROWS_YIELDED, 1));
    }

    fn raise_if_faulted(&mut self) -> Result<(), DataSourceError> {
        if let FaultState::Faulted(cause) = self.fault.state() {
            self.record_metric(|m| m.increment_counter(PRODUCER_FAULTS, 1));
            self.finish();
            return Err(DataSourceError::new(self.source_name.clone(), cause));
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.state = State::Finished;
        self.current = None;
        self.rows = Vec::new().into_iter();
        if self.cancellation.is_producer_finished()
            && let Some(task) = self.producer.as_mut()
        {
            task.join();
        }
        self.record_metric(MetricsCollector::record_end);
    }

    fn record_metric(&self, f: impl FnOnce(&MetricsCollector)) {
        if let Some(m) = &self.metrics {
            f(m);
        }
    }
}

impl<R> Drop for ChunkEnumerator<R> {
    fn drop(&mut self) {
        if !self.cancellation.is_producer_finished() {
            self.cancellation.abandon();
        }
    }
}

impl<R: Send + 'static> Iterator for ChunkEnumerator<R> {
    type Item = Result<R, DataSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.move_next() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl<R: Send + 'static> FusedIterator for ChunkEnumerator<R> {}
