//! # Rowstream
//!
//! A **chunked row-streaming engine**: independent, I/O-bound producers (API
//! clients, file readers, database cursors) hand rows to a pull-based consumer
//! in chunks, on a background thread, so the consumer never blocks on the
//! producer's network or disk latency.
//!
//! ## Key Features
//!
//! - **Background producers** - each enumeration runs its producer routine on its own thread
//! - **Bounded hand-off** - optional queue capacity applies back-pressure to fast producers
//! - **Cooperative cancellation** - caller tokens are observed between chunks on both sides
//! - **Fault propagation** - producer errors and panics reach the consumer as one [`DataSourceError`]
//! - **Typed rows** - [`ColumnMap`] describes an item type once; [`Record`] exposes it by name or position
//! - **Ready-made sources** - paginated APIs, JSON Lines files, concurrent partition fetches
//!
//! ## Quick Start
//!
//! ```
//! use rowstream::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let source = ChunkedSource::from_fn("squares", |sink, cancel| {
//!     for page in 0..3u64 {
//!         cancel.check()?;
//!         sink.put_rows((page * 10..page * 10 + 10).map(|n| n * n).collect())?;
//!     }
//!     Ok(())
//! });
//!
//! let total: u64 = source.iter().sum::<Result<u64, _>>()?;
//! assert_eq!(total, (0..30u64).map(|n| n * n).sum::<u64>());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Chunked sources
//!
//! A [`ChunkedSource`] wraps a producer routine ([`CollectChunks`]). It is not a
//! materialized collection: each [`enumerate`](ChunkedSource::enumerate) starts
//! a fresh run with its own queue, so iterating twice does the work twice.
//!
//! ### Enumeration
//!
//! A [`ChunkEnumerator`] spawns the producer on its first pull, then takes
//! [`Chunk`]s off the [`HandoffQueue`] in order and yields their rows one by
//! one. Empty chunks never yield anything; the producer uses one as the
//! completion sentinel.
//!
//! ### Cancellation and faults
//!
//! Pass a [`CancellationToken`] with [`with_cancellation`](ChunkedSource::with_cancellation).
//! Cancelling it ends the sequence cleanly (`false`, no error). Any other
//! producer failure is stored in the run's [`FaultCell`] and raised on the
//! consumer's thread, after the rows handed off before it.
//!
//! ## Module Overview
//!
//! - [`source`] - the `ChunkedSource` facade
//! - [`enumerator`] - the consumer-side iterator
//! - [`producer`] - producer routines and the background task running them
//! - [`queue`] - the hand-off queue
//! - [`fault`] - the single-assignment fault cell
//! - [`cancel`] - cancellation tokens and the per-run controller
//! - [`row`] - the row contract and column maps
//! - [`sources`] - ready-made producers
//! - [`metrics`] - per-stream counters
//! - [`testing`] - scripted producers and assertions

pub mod cancel;
pub mod chunk;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod fault;
pub mod metrics;
pub mod producer;
pub mod queue;
pub mod row;
pub mod source;
pub mod sources;
pub mod testing;

// General re-exports
pub use cancel::{CancellationToken, Cancelled, StreamCancellation};
pub use chunk::Chunk;
pub use config::StreamConfig;
pub use enumerator::ChunkEnumerator;
pub use error::{DataSourceError, RowError, StreamError};
pub use fault::{FaultCell, FaultState, ProducerOutcome};
pub use metrics::MetricsCollector;
pub use producer::{ChunkSink, CollectChunks, CollectError, FnCollector, ProducerTask};
pub use queue::HandoffQueue;
pub use row::{ColumnMap, JoinedRow, Record, Row, Value};
pub use source::ChunkedSource;

// Gated re-exports
#[cfg(feature = "io-jsonl")]
pub use sources::jsonl::JsonlSource;

#[cfg(feature = "parallel-io")]
pub use sources::fanout::FanOutSource;

pub use sources::paged::{Page, PagedSource};
