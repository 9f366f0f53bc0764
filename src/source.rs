//! [`ChunkedSource`]: the facade consumers iterate.
//!
//! A chunked source looks like a collection but behaves like a stream: every
//! enumeration builds a fresh hand-off queue, fault cell and cancellation
//! controller, and runs the producer routine again from scratch. Nothing is
//! cached between enumerations.
//!
//! ```
//! use rowstream::{ChunkedSource, Chunk};
//!
//! let source = ChunkedSource::from_fn("letters", |sink, _cancel| {
//!     sink.put(Chunk::new(vec!['a', 'b', 'c']))?;
//!     sink.put(Chunk::new(vec!['d']))?;
//!     Ok(())
//! });
//!
//! let letters: String = source.iter().map(Result::unwrap).collect();
//! assert_eq!(letters, "abcd");
//! ```

use crate::cancel::{CancellationToken, StreamCancellation};
use crate::config::StreamConfig;
use crate::enumerator::ChunkEnumerator;
use crate::error::DataSourceError;
use crate::metrics::MetricsCollector;
use crate::producer::{ChunkSink, CollectChunks, CollectError, FnCollector};
use std::fmt;
use std::sync::Arc;

/// A restartable-looking, single-use-per-iteration sequence of rows.
pub struct ChunkedSource<R> {
    name: String,
    collector: Arc<dyn CollectChunks<R>>,
    config: StreamConfig,
    cancellation: CancellationToken,
    metrics: Option<MetricsCollector>,
}

impl<R: Send + 'static> ChunkedSource<R> {
    /// Wrap a [`CollectChunks`] implementation.
    pub fn new(name: impl Into<String>, collector: impl CollectChunks<R>) -> Self {
        Self {
            name: name.into(),
            collector: Arc::new(collector),
            config: StreamConfig::default(),
            cancellation: CancellationToken::new(),
            metrics: None,
        }
    }

    /// Wrap a closure as the producer routine.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ChunkSink<R>, &CancellationToken) -> Result<(), CollectError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, FnCollector(f))
    }

    #[must_use]
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `token` as the external cancellation signal for every enumeration.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Start a new, independent enumeration. The producer is spawned lazily on
    /// the first pull.
    #[must_use]
    pub fn enumerate(&self) -> ChunkEnumerator<R> {
        ChunkEnumerator::new(
            self.name.clone(),
            self.config.clone(),
            Arc::clone(&self.collector),
            StreamCancellation::new(self.cancellation.clone()),
        )
        .with_metrics(self.metrics.clone())
    }

    /// Alias of [`enumerate`](Self::enumerate) for iterator-style call sites.
    #[must_use]
    pub fn iter(&self) -> ChunkEnumerator<R> {
        self.enumerate()
    }

    /// Run one enumeration to the end and gather its rows.
    ///
    /// # Errors
    /// The producer's fault, if any. Rows delivered before it are discarded.
    pub fn collect_rows(&self) -> Result<Vec<R>, DataSourceError> {
        self.enumerate().collect()
    }
}

impl<R: Send + 'static> IntoIterator for &ChunkedSource<R> {
    type Item = Result<R, DataSourceError>;
    type IntoIter = ChunkEnumerator<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.enumerate()
    }
}

impl<R> fmt::Debug for ChunkedSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedSource")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
