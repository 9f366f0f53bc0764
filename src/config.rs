//! Tuning knobs for a streaming run.

use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every enumeration of a [`ChunkedSource`](crate::ChunkedSource).
///
/// None of these values affect correctness: the poll interval only bounds how
/// long the consumer waits on the queue before re-checking for faults,
/// completion and cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Upper bound on a single wait for the next chunk.
    pub poll_interval_ms: u64,
    /// Maximum chunks in flight. `None` never blocks the producer.
    pub queue_capacity: Option<usize>,
    /// Name given to producer threads.
    pub thread_name: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            queue_capacity: None,
            thread_name: "rowstream-producer".to_string(),
        }
    }
}

impl StreamConfig {
    /// Sub-millisecond intervals round up to 1 ms.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        let millis = interval.as_nanos().div_ceil(1_000_000).max(1);
        self.poll_interval_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use]
    /// Never zero: a hand-built config with `poll_interval_ms: 0` waits 1 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// # Errors
    /// [`StreamError::InvalidConfig`] for a zero poll interval, a zero queue
    /// capacity, or a thread name containing NUL.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.poll_interval_ms == 0 {
            return Err(StreamError::InvalidConfig(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(StreamError::InvalidConfig(
                "queue_capacity must be greater than zero".into(),
            ));
        }
        if self.thread_name.contains('\0') {
            return Err(StreamError::InvalidConfig(
                "thread_name must not contain NUL".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    /// [`StreamError::Config`] on malformed JSON, or see [`validate`](Self::validate).
    pub fn from_json_str(s: &str) -> Result<Self, StreamError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
