//! The producer side of a stream.
//!
//! A data source implements [`CollectChunks`]: a routine that pushes chunks
//! into a [`ChunkSink`] until it runs out of data or notices cancellation.
//! [`ProducerTask`] runs that routine once on its own thread and, however the
//! routine ends, performs the finalization sequence exactly once:
//!
//! 1. record the [`ProducerOutcome`] in the [`FaultCell`],
//! 2. push the completion sentinel so a waiting consumer wakes up,
//! 3. mark the queue as adding-complete,
//! 4. raise the "producer finished" half of the composite cancellation.
//!
//! The outcome is written first so that a consumer who sees the queue drained
//! is guaranteed to also see the fault.

use crate::cancel::{CancellationToken, Cancelled, StreamCancellation};
use crate::chunk::Chunk;
use crate::error::StreamError;
use crate::fault::{FaultCell, ProducerOutcome};
use crate::queue::HandoffQueue;
use anyhow::anyhow;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// Why a producer routine stopped early.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The routine observed cancellation and stopped. Not a fault.
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(anyhow::Error),
}

impl From<Cancelled> for CollectError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<anyhow::Error> for CollectError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(err)
    }
}

/// A data source's "collect chunks" routine.
///
/// Called at most once per enumeration, on a background thread. The routine
/// should check `cancel` between chunks (the sink's `put` already does) and
/// return promptly once it is cancelled. It must not be invoked concurrently
/// with itself for the same enumeration; the producer task guarantees that.
pub trait CollectChunks<R>: Send + Sync + 'static {
    /// # Errors
    /// [`CollectError::Cancelled`] when stopping because of `cancel`,
    /// [`CollectError::Failed`] for anything else.
    fn collect_chunks(&self, sink: &ChunkSink<R>, cancel: &CancellationToken)
    -> Result<(), CollectError>;
}

/// Adapts a closure into a [`CollectChunks`] implementation.
pub struct FnCollector<F>(pub F);

impl<R, F> CollectChunks<R> for FnCollector<F>
where
    F: Fn(&ChunkSink<R>, &CancellationToken) -> Result<(), CollectError> + Send + Sync + 'static,
{
    fn collect_chunks(
        &self,
        sink: &ChunkSink<R>,
        cancel: &CancellationToken,
    ) -> Result<(), CollectError> {
        (self.0)(sink, cancel)
    }
}

/// Append-only handle to the hand-off queue given to a producer routine.
pub struct ChunkSink<R> {
    queue: Arc<HandoffQueue<R>>,
    cancel: CancellationToken,
}

impl<R> ChunkSink<R> {
    pub(crate) fn new(queue: Arc<HandoffQueue<R>>, cancel: CancellationToken) -> Self {
        Self { queue, cancel }
    }

    /// Hand `chunk` to the consumer, blocking while the queue is full.
    ///
    /// # Errors
    /// [`Cancelled`] if the stream was cancelled before the chunk was queued.
    pub fn put(&self, chunk: Chunk<R>) -> Result<(), Cancelled> {
        trace!(rows = chunk.len(), "handing off chunk");
        self.queue.put(chunk, &self.cancel)
    }

    /// Shorthand for `put(Chunk::new(rows))`.
    ///
    /// # Errors
    /// See [`put`](Self::put).
    pub fn put_rows(&self, rows: Vec<R>) -> Result<(), Cancelled> {
        self.put(Chunk::new(rows))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// One background run of a [`CollectChunks`] routine.
#[derive(Debug)]
pub struct ProducerTask {
    handle: Option<JoinHandle<()>>,
}

impl ProducerTask {
    /// Start `collector` on a new thread named `thread_name`.
    ///
    /// # Errors
    /// [`StreamError::Spawn`] if the OS refuses the thread. Finalization has
    /// still run in that case, recording a fault.
    pub fn spawn<R: Send + 'static>(
        source_name: &str,
        thread_name: &str,
        collector: Arc<dyn CollectChunks<R>>,
        queue: Arc<HandoffQueue<R>>,
        fault: Arc<FaultCell>,
        cancellation: StreamCancellation,
    ) -> Result<Self, StreamError> {
        let finalizer = Finalizer {
            source_name: source_name.to_string(),
            queue,
            fault,
            cancellation,
            outcome: None,
        };
        debug!(source = source_name, thread = thread_name, "spawning producer");
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run(collector.as_ref(), finalizer))
            .map_err(StreamError::Spawn)?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the producer thread to exit. Idempotent.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Panics are caught inside `run`; a join error cannot carry a fault.
            let _ = handle.join();
        }
    }
}

fn run<R: Send + 'static>(collector: &dyn CollectChunks<R>, mut finalizer: Finalizer<R>) {
    let cancel = finalizer.cancellation.composite().clone();
    let sink = ChunkSink::new(Arc::clone(&finalizer.queue), cancel.clone());

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        collector.collect_chunks(&sink, &cancel)
    }));

    finalizer.outcome = Some(match result {
        Ok(Ok(())) => ProducerOutcome::Completed,
        Ok(Err(CollectError::Cancelled)) if cancel.is_cancelled() => ProducerOutcome::Cancelled,
        Ok(Err(CollectError::Cancelled)) => ProducerOutcome::failed(anyhow!(
            "producer reported cancellation but none was requested"
        )),
        Ok(Err(CollectError::Failed(err))) => ProducerOutcome::failed(err),
        Err(payload) => {
            ProducerOutcome::failed(anyhow!("producer panicked: {}", panic_message(&*payload)))
        }
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Runs the finalization sequence when dropped, so no exit path can skip it.
struct Finalizer<R> {
    source_name: String,
    queue: Arc<HandoffQueue<R>>,
    fault: Arc<FaultCell>,
    cancellation: StreamCancellation,
    outcome: Option<ProducerOutcome>,
}

impl<R> Drop for Finalizer<R> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            ProducerOutcome::failed(anyhow!("producer exited before reporting an outcome"))
        });
        debug!(source = %self.source_name, outcome = outcome.kind(), "producer finished");
        self.fault.set(outcome);
        self.queue.push_sentinel();
        self.queue.mark_adding_complete();
        self.cancellation.signal_producer_finished();
    }
}
