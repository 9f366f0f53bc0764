//! A producer driven by a fixed script, for exercising consumers.

use crate::cancel::{CancellationToken, Cancelled};
use crate::chunk::Chunk;
use crate::producer::{ChunkSink, CollectChunks, CollectError};
use anyhow::anyhow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// One step of a [`ScriptedProducer`].
#[derive(Debug, Clone)]
pub enum Step<R> {
    /// Put one chunk (possibly empty).
    Push(Vec<R>),
    Sleep(Duration),
    /// Fail with an error whose message is the given text.
    Fail(String),
    Panic(String),
    /// Block until cancelled (or the timeout elapses), then stop with
    /// [`CollectError::Cancelled`].
    WaitForCancel(Duration),
    /// Put the same chunk over and over until a put is cancelled.
    RepeatUntilCancelled(Vec<R>),
}

/// Scripted [`CollectChunks`] implementation.
///
/// Counts how many times it was invoked and how many chunks it managed to
/// put, across all enumerations.
///
/// ```
/// use rowstream::testing::ScriptedProducer;
/// use rowstream::ChunkedSource;
///
/// let script = ScriptedProducer::new().push(vec![1, 2, 3]).push(vec![]).push(vec![4, 5]);
/// let calls = script.invocations();
/// let source = ChunkedSource::new("script", script);
///
/// assert_eq!(source.collect_rows().unwrap(), vec![1, 2, 3, 4, 5]);
/// assert_eq!(calls.get(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedProducer<R> {
    steps: Vec<Step<R>>,
    invocations: Counter,
    chunks_put: Counter,
}

/// Shared counter handle.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl<R> Default for ScriptedProducer<R> {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            invocations: Counter::default(),
            chunks_put: Counter::default(),
        }
    }
}

impl<R> ScriptedProducer<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn step(mut self, step: Step<R>) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn push(self, rows: Vec<R>) -> Self {
        self.step(Step::Push(rows))
    }

    #[must_use]
    pub fn sleep(self, duration: Duration) -> Self {
        self.step(Step::Sleep(duration))
    }

    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.step(Step::Fail(message.into()))
    }

    #[must_use]
    pub fn panic(self, message: impl Into<String>) -> Self {
        self.step(Step::Panic(message.into()))
    }

    #[must_use]
    pub fn wait_for_cancel(self, timeout: Duration) -> Self {
        self.step(Step::WaitForCancel(timeout))
    }

    #[must_use]
    pub fn repeat_until_cancelled(self, rows: Vec<R>) -> Self {
        self.step(Step::RepeatUntilCancelled(rows))
    }

    /// Number of times the routine has been started.
    #[must_use]
    pub fn invocations(&self) -> Counter {
        self.invocations.clone()
    }

    /// Number of chunks successfully put.
    #[must_use]
    pub fn chunks_put(&self) -> Counter {
        self.chunks_put.clone()
    }

    fn put(&self, sink: &ChunkSink<R>, rows: Vec<R>) -> Result<(), Cancelled> {
        sink.put(Chunk::new(rows))?;
        self.chunks_put.bump();
        Ok(())
    }
}

impl<R> CollectChunks<R> for ScriptedProducer<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn collect_chunks(
        &self,
        sink: &ChunkSink<R>,
        cancel: &CancellationToken,
    ) -> Result<(), CollectError> {
        self.invocations.bump();
        for step in &self.steps {
            match step {
                Step::Push(rows) => self.put(sink, rows.clone())?,
                Step::Sleep(d) => thread::sleep(*d),
                Step::Fail(msg) => return Err(anyhow!("{msg}").into()),
                Step::Panic(msg) => panic!("{msg}"),
                Step::WaitForCancel(timeout) => {
                    let deadline = Instant::now() + *timeout;
                    while !cancel.is_cancelled() && Instant::now() < deadline {
                        thread::sleep(Duration::from_millis(1));
                    }
                    return Err(CollectError::Cancelled);
                }
                Step::RepeatUntilCancelled(rows) => loop {
                    self.put(sink, rows.clone())?;
                },
            }
        }
        Ok(())
    }
}
