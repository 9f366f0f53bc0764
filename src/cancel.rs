//! Cooperative cancellation.
//!
//! [`CancellationToken`] is a cheap, cloneable flag. Tokens can be linked so
//! that a child reads as cancelled when any of its parents is, which is how
//! [`StreamCancellation`] builds the composite signal observed by a stream:
//! the caller's token OR the producer's own "finished" token.
//!
//! Cancellation is polled, never awaited: producers check the token between
//! chunks and the consumer checks it between bounded waits on the queue.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Returned by operations that gave up because cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// A cloneable cancellation flag, optionally linked to parent tokens.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    parents: Vec<CancellationToken>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is cancelled when it, or any of `parents`, is cancelled.
    ///
    /// Cancelling the returned token does not cancel the parents.
    #[must_use]
    pub fn linked(parents: &[CancellationToken]) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parents: parents.to_vec(),
            }),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
            || self.inner.parents.iter().any(CancellationToken::is_cancelled)
    }

    /// `Err(Cancelled)` if cancellation was requested, so routines can write
    /// `cancel.check()?` between units of work.
    ///
    /// # Errors
    /// [`Cancelled`] once the token (or a parent) is cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// The cancellation controller of one streaming run.
///
/// Combines the caller's external token with an internal token raised exactly
/// once, when the producer task finishes. [`composite`](Self::composite) is
/// the OR of both and is what the producer routine observes.
#[derive(Debug, Clone)]
pub struct StreamCancellation {
    external: CancellationToken,
    producer_finished: CancellationToken,
    composite: CancellationToken,
}

impl StreamCancellation {
    #[must_use]
    pub fn new(external: CancellationToken) -> Self {
        let producer_finished = CancellationToken::new();
        let composite = CancellationToken::linked(&[external.clone(), producer_finished.clone()]);
        Self {
            external,
            producer_finished,
            composite,
        }
    }

    #[must_use]
    pub fn external(&self) -> &CancellationToken {
        &self.external
    }

    #[must_use]
    pub fn composite(&self) -> &CancellationToken {
        &self.composite
    }

    /// True once the caller cancelled, or the consumer abandoned the run.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.external.is_cancelled() || self.composite.inner.cancelled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_producer_finished(&self) -> bool {
        self.producer_finished.is_cancelled()
    }

    pub(crate) fn signal_producer_finished(&self) {
        self.producer_finished.cancel();
    }

    /// Cancel the composite without touching the caller's token. Used when the
    /// consumer walks away from an unfinished run.
    pub(crate) fn abandon(&self) {
        self.composite.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_token_follows_any_parent() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let child = CancellationToken::linked(&[a.clone(), b.clone()]);
        assert!(!child.is_cancelled());
        b.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.check(), Err(Cancelled));
        assert!(!a.is_cancelled());
    }

    #[test]
    fn cancelling_child_leaves_parents_alone() {
        let parent = CancellationToken::new();
        let child = CancellationToken::linked(std::slice::from_ref(&parent));
        child.cancel();
        assert!(child.is_cancelled());
        assert!(parent.check().is_ok());
    }

    #[test]
    fn producer_finish_is_not_a_stop_request() {
        let external = CancellationToken::new();
        let run = StreamCancellation::new(external.clone());
        run.signal_producer_finished();
        assert!(run.composite().is_cancelled());
        assert!(run.is_producer_finished());
        assert!(!run.is_stop_requested());

        let other = StreamCancellation::new(external.clone());
        other.abandon();
        assert!(other.is_stop_requested());
        assert!(!external.is_cancelled());

        external.cancel();
        assert!(run.is_stop_requested());
    }
}
