//! The hand-off queue between one producer and one consumer.
//!
//! A FIFO of [`Chunk`]s on top of a `crossbeam-channel` channel, bounded when
//! a capacity is configured. The channel carries the data; an atomic flag
//! carries "adding complete" so the consumer can tell "empty for now" from
//! "empty for good" without blocking.

use crate::cancel::{CancellationToken, Cancelled};
use crate::chunk::Chunk;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How long a blocked `put` waits before re-checking cancellation.
const PUT_POLL: Duration = Duration::from_millis(10);

/// Bounded (or unbounded) FIFO of chunks, safe for one producer and one
/// consumer on different threads.
#[derive(Debug)]
pub struct HandoffQueue<R> {
    tx: Sender<Chunk<R>>,
    rx: Receiver<Chunk<R>>,
    complete: AtomicBool,
    capacity: Option<usize>,
}

impl<R> HandoffQueue<R> {
    /// `capacity: None` makes `put` never block.
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        let (tx, rx) = match capacity {
            Some(cap) => crossbeam_channel::bounded(cap.max(1)),
            None => crossbeam_channel::unbounded(),
        };
        Self {
            tx,
            rx,
            complete: AtomicBool::new(false),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Enqueue `chunk`, blocking while the queue is full.
    ///
    /// # Errors
    /// [`Cancelled`] if `cancel` fires before space frees up. The chunk is
    /// dropped in that case.
    ///
    /// # Panics
    /// If called after [`mark_adding_complete`](Self::mark_adding_complete).
    pub fn put(&self, chunk: Chunk<R>, cancel: &CancellationToken) -> Result<(), Cancelled> {
        assert!(
            !self.is_complete(),
            "HandoffQueue::put called after mark_adding_complete"
        );
        cancel.check()?;
        let mut pending = chunk;
        loop {
            match self.tx.send_timeout(pending, PUT_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(back)) => {
                    cancel.check()?;
                    pending = back;
                }
                // The queue owns its receiver, so the channel cannot disconnect
                // while `self` is alive.
                Err(SendTimeoutError::Disconnected(_)) => return Err(Cancelled),
            }
        }
    }

    /// Take the next chunk, waiting at most `timeout`.
    pub fn try_take(&self, timeout: Duration) -> Option<Chunk<R>> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Some(chunk),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Declare that no further chunks will be put. Idempotent.
    pub fn mark_adding_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Number of chunks currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Complete and empty: nothing will ever be taken again.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.is_complete() && self.is_empty()
    }

    /// Push the completion sentinel without blocking. A full queue already
    /// wakes the consumer, so the sentinel is skipped in that case.
    pub(crate) fn push_sentinel(&self) -> bool {
        match self.tx.try_send(Chunk::sentinel()) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }
}
