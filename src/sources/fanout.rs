//! Partitioned source that fetches independent partitions concurrently.
//!
//! Partitions are fetched on the rayon pool in waves of `parallelism`; within
//! a wave the results are pushed in partition order, so the consumer sees the
//! same order as a sequential walk. The first failing partition (in partition
//! order) faults the stream after the chunks before it have been pushed.
//!
//! * `parallelism`: defaults to `num_cpus::get()`, clamped to at least 1.

use crate::cancel::CancellationToken;
use crate::producer::{ChunkSink, CollectChunks, CollectError};
use anyhow::Context;
use rayon::prelude::*;
use std::fmt::Debug;
use tracing::trace;

/// Producer that fans out over a fixed list of partition keys.
pub struct FanOutSource<K, F> {
    partitions: Vec<K>,
    fetch: F,
    parallelism: usize,
}

impl<K, F> FanOutSource<K, F> {
    pub fn new<T>(partitions: Vec<K>, fetch: F) -> Self
    where
        F: Fn(&K) -> anyhow::Result<Vec<T>>,
    {
        Self {
            partitions,
            fetch,
            parallelism: num_cpus::get().max(1),
        }
    }

    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }
}

impl<K, T, F> CollectChunks<T> for FanOutSource<K, F>
where
    K: Debug + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(&K) -> anyhow::Result<Vec<T>> + Send + Sync + 'static,
{
    fn collect_chunks(
        &self,
        sink: &ChunkSink<T>,
        cancel: &CancellationToken,
    ) -> Result<(), CollectError> {
        for wave in self.partitions.chunks(self.parallelism) {
            cancel.check()?;
            let results: Vec<anyhow::Result<Vec<T>>> = wave
                .par_iter()
                .map(|key| {
                    (self.fetch)(key).with_context(|| format!("fetch partition {key:?}"))
                })
                .collect();
            trace!(partitions = wave.len(), "fetched wave");
            for rows in results {
                let rows = rows?;
                if !rows.is_empty() {
                    sink.put_rows(rows)?;
                }
            }
        }
        Ok(())
    }
}
