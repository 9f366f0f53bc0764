//! Error types surfaced by the streaming core.
//!
//! - [`DataSourceError`] is the single error a consumer sees when a producer
//!   fails. It carries the producer's original error as its cause.
//! - [`RowError`] covers column lookups on a [`Row`](crate::Row).
//! - [`StreamError`] covers setup failures (configuration, thread spawn).

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// A producer fault transported to the consumer's thread.
///
/// Raised at most once per enumeration, from the `move_next` call that follows
/// the last row the producer managed to deliver. Rows delivered before the
/// fault remain valid.
#[derive(Debug, Clone)]
pub struct DataSourceError {
    pub source_name: String,
    cause: Arc<anyhow::Error>,
}

impl DataSourceError {
    pub fn new(source_name: impl Into<String>, cause: Arc<anyhow::Error>) -> Self {
        Self {
            source_name: source_name.into(),
            cause,
        }
    }

    /// The error the producer routine failed with.
    #[must_use]
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// The innermost error in the producer's error chain.
    #[must_use]
    pub fn root_cause(&self) -> &(dyn Error + 'static) {
        self.cause.root_cause()
    }
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data source `{}` failed: {}", self.source_name, self.cause)
    }
}

impl Error for DataSourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        let inner: &(dyn Error + 'static) = &**self.cause;
        Some(inner)
    }
}

/// Column lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("column index {index} out of range for row of width {width}")]
    ColumnOutOfRange { index: usize, width: usize },
    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),
}

/// Failures setting up a stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("failed to spawn producer thread")]
    Spawn(#[source] std::io::Error),
    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse stream configuration")]
    Config(#[from] serde_json::Error),
}
